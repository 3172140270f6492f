//! Double-spend resolution and cascading removal.

use crate::db::WriteTxn;
use crate::entry::{Spender, TxEntry};
use crate::index::LedgerRead;
use crate::Result;
use bitcoin::{OutPoint, Transaction, Txid};
use std::collections::{HashSet, VecDeque};

/// Installs a debit for every input of `tx` that spends a known credit.
///
/// When the credit is already debited by another transaction, the incoming
/// one takes it over unless it is unmined and the current spender is
/// confirmed. Unmined losers left without any credit or debit are purged.
pub(crate) fn resolve_debits(
    txn: &mut WriteTxn<'_>,
    txid: Txid,
    tx: &Transaction,
    mined: bool,
) -> Result<()> {
    if tx.is_coinbase() {
        return Ok(());
    }

    let mut losers = Vec::new();

    for (input, txin) in tx.input.iter().enumerate() {
        let outpoint = txin.previous_output;
        let Some(credit) = txn.credit(&outpoint)? else {
            continue;
        };
        let spender = Spender {
            txid,
            input: input as u32,
        };

        let current_spender = credit.spent_by;
        match current_spender {
            Some(current) if current == spender => {}
            None => {
                txn.install_debit(&outpoint, credit, spender)?;
            }
            Some(current) => {
                let current_entry = txn.tx_entry(&current.txid)?;
                let current_mined = current_entry.as_ref().is_some_and(TxEntry::is_mined);

                if !mined && current_mined {
                    tracing::debug!(
                        "Unmined {txid} double spends {outpoint} already spent by confirmed {}",
                        current.txid
                    );
                    continue;
                }

                tracing::debug!(
                    "{txid} replaces {} as spender of {outpoint}",
                    current.txid
                );
                txn.delete_debit(&current);
                txn.install_debit(&outpoint, credit, spender)?;

                if current_entry.is_some_and(|entry| !entry.is_mined()) {
                    losers.push(current.txid);
                }
            }
        }
    }

    let mut orphaned = Vec::new();
    for loser in losers {
        if txn.credits_of(&loser)?.is_empty() && txn.debits_of(&loser)?.is_empty() {
            orphaned.push(loser);
        }
    }
    if !orphaned.is_empty() {
        purge(txn, orphaned)?;
    }

    Ok(())
}

/// Removes every unmined transaction sharing a previous output with `tx`,
/// together with their descendants.
pub(crate) fn evict_conflicts(
    txn: &mut WriteTxn<'_>,
    txid: Txid,
    tx: &Transaction,
) -> Result<Vec<Txid>> {
    if tx.is_coinbase() {
        return Ok(Vec::new());
    }

    let mut conflicts = Vec::new();
    for txin in &tx.input {
        for spender in txn.spenders_of(&txin.previous_output)? {
            if spender.txid != txid
                && !conflicts.contains(&spender.txid)
                && txn.is_unmined(&spender.txid)?
            {
                conflicts.push(spender.txid);
            }
        }
    }

    if conflicts.is_empty() {
        return Ok(conflicts);
    }

    tracing::debug!(
        "Confirmed {txid} evicts {} conflicting unmined transaction(s)",
        conflicts.len()
    );

    purge(txn, conflicts)
}

/// Removes `roots` and every transaction that transitively spends one of
/// their outputs.
///
/// Transactions are collected breadth-first and removed in reverse discovery
/// order, so leaves go before the roots they descend from. Returns the
/// removed txids in removal order.
pub(crate) fn purge(txn: &mut WriteTxn<'_>, roots: Vec<Txid>) -> Result<Vec<Txid>> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from(roots);
    let mut found = Vec::new();

    while let Some(txid) = queue.pop_front() {
        if !seen.insert(txid) {
            continue;
        }
        let Some(entry) = txn.tx_entry(&txid)? else {
            continue;
        };
        let tx = entry.decode_tx()?;
        for vout in 0..tx.output.len() as u32 {
            for spender in txn.spenders_of(&OutPoint { txid, vout })? {
                queue.push_back(spender.txid);
            }
        }
        found.push((txid, entry, tx));
    }

    let removed = found.iter().rev().map(|(txid, ..)| *txid).collect::<Vec<_>>();
    let purged = removed.iter().copied().collect::<HashSet<_>>();

    for (txid, entry, tx) in found.into_iter().rev() {
        remove_tx(txn, txid, &entry, &tx, &purged)?;
    }

    Ok(removed)
}

/// Deletes a single transaction with its credits, debits and index entries.
///
/// Credits it was debiting are handed to another stored spender outside
/// `purged`, or become unspent.
fn remove_tx(
    txn: &mut WriteTxn<'_>,
    txid: Txid,
    entry: &TxEntry,
    tx: &Transaction,
    purged: &HashSet<Txid>,
) -> Result<()> {
    txn.delete_tx_entry(&txid);
    txn.clear_unmined(&txid);
    if let Some(block) = &entry.block {
        txn.remove_from_block(block.height(), &txid)?;
    }

    txn.unindex_spends(&txid, tx);

    for (input, debit) in txn.debits_of(&txid)? {
        let spender = Spender { txid, input };
        txn.delete_debit(&spender);

        let Some(mut credit) = txn.credit(&debit.credit)? else {
            continue;
        };
        if credit.spent_by != Some(spender) {
            continue;
        }
        match txn.preferred_spender(&debit.credit, purged)? {
            Some(next) => {
                tracing::debug!("Credit {} now spent by {}", debit.credit, next.txid);
                txn.install_debit(&debit.credit, credit, next)?;
            }
            None => {
                credit.spent_by = None;
                txn.put_credit(&debit.credit, &credit)?;
            }
        }
    }

    for (outpoint, _) in txn.credits_of(&txid)? {
        txn.delete_credit(&outpoint);
    }

    tracing::debug!("Removed transaction {txid}");

    Ok(())
}
