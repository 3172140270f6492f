//! Read-only queries: balances, unspent outputs and transaction details.

use crate::db::KvRead;
use crate::entry::{decode, CreditEntry, Spender};
use crate::index::LedgerRead;
use crate::keys::{key_to_outpoint, key_to_txid};
use crate::record::{BlockMeta, IndexedBlock, TxRecord};
use crate::{Column, Error, Result};
use bitcoin::{Amount, OutPoint, ScriptBuf, Txid};
use std::collections::HashMap;

/// Which unspent credits a balance includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceFilter {
    /// Credits with enough confirmations, excluding immature coinbase outputs.
    #[default]
    Spendable,
    /// Credits with enough confirmations, regardless of coinbase maturity.
    All,
    /// Coinbase credits that have not reached maturity yet.
    Immature,
}

/// Balance breakdown at a given chain height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balances {
    /// Confirmed and spendable.
    pub confirmed: Amount,
    /// Received by transactions that are not yet in a block.
    pub unconfirmed: Amount,
    /// Confirmed coinbase outputs below maturity.
    pub immature: Amount,
    /// Sum of the above.
    pub total: Amount,
}

/// An unspent wallet output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub outpoint: OutPoint,
    pub amount: Amount,
    pub is_coinbase: bool,
    /// Whether the output pays back to the wallet as change.
    pub change: bool,
    pub script_pubkey: ScriptBuf,
    /// Block of the creating transaction, `None` while unmined.
    pub block: Option<BlockMeta>,
    /// Receipt time of the creating transaction.
    pub received: u64,
}

impl Credit {
    /// Number of confirmations at `sync_height`, 0 while unmined.
    ///
    /// May be negative when `sync_height` lies below the block.
    pub fn confirmations(&self, sync_height: u32) -> i64 {
        confirmations(self.block.as_ref(), sync_height)
    }
}

/// Credit status of a single output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditStatus {
    pub index: u32,
    pub amount: Amount,
    pub change: bool,
    pub spent_by: Option<Spender>,
}

/// Input that spends a wallet credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debit {
    pub index: u32,
    pub credit: OutPoint,
    pub amount: Amount,
}

/// Everything the store knows about one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxDetails {
    pub record: TxRecord,
    pub block: Option<BlockMeta>,
    /// Wallet credits, ordered by output index.
    pub credits: Vec<CreditStatus>,
    /// Wallet debits, ordered by input index.
    pub debits: Vec<Debit>,
}

fn confirmations(block: Option<&BlockMeta>, sync_height: u32) -> i64 {
    match block {
        Some(block) => i64::from(sync_height) - i64::from(block.height()) + 1,
        None => 0,
    }
}

fn is_included(
    filter: BalanceFilter,
    credit: &Credit,
    min_conf: u32,
    sync_height: u32,
    coinbase_maturity: u32,
) -> bool {
    let depth = credit.confirmations(sync_height);
    let mature = !credit.is_coinbase || depth >= i64::from(coinbase_maturity);
    match filter {
        BalanceFilter::Spendable => depth >= i64::from(min_conf) && mature,
        BalanceFilter::All => depth >= i64::from(min_conf),
        BalanceFilter::Immature => !mature,
    }
}

/// Every credit not referenced by a debit, in outpoint key order.
pub(crate) fn unspent_outputs(db: &impl KvRead) -> Result<Vec<Credit>> {
    let mut blocks: HashMap<Txid, Option<(Option<BlockMeta>, u64)>> = HashMap::new();
    let mut unspent = Vec::new();

    for (key, value) in db.scan_prefix(Column::Credits, &[])? {
        let entry: CreditEntry = decode(&value)?;
        if entry.spent_by.is_some() {
            continue;
        }
        let outpoint = key_to_outpoint(&key)?;

        let owner = match blocks.get(&outpoint.txid).copied() {
            Some(owner) => owner,
            None => {
                let owner = db
                    .tx_entry(&outpoint.txid)?
                    .map(|tx| (tx.block, tx.received));
                blocks.insert(outpoint.txid, owner);
                owner
            }
        };
        let Some((block, received)) = owner else {
            tracing::warn!("Credit {outpoint} has no owning transaction");
            continue;
        };

        unspent.push(Credit {
            outpoint,
            amount: Amount::from_sat(entry.amount),
            is_coinbase: entry.is_coinbase,
            change: entry.change,
            script_pubkey: entry.script_pubkey,
            block,
            received,
        });
    }

    Ok(unspent)
}

pub(crate) fn balance(
    db: &impl KvRead,
    min_conf: u32,
    sync_height: u32,
    filter: BalanceFilter,
    coinbase_maturity: u32,
) -> Result<Amount> {
    Ok(unspent_outputs(db)?
        .iter()
        .filter(|credit| is_included(filter, credit, min_conf, sync_height, coinbase_maturity))
        .map(|credit| credit.amount)
        .sum())
}

pub(crate) fn balances(
    db: &impl KvRead,
    sync_height: u32,
    coinbase_maturity: u32,
) -> Result<Balances> {
    let mut balances = Balances::default();

    // Credits in blocks above `sync_height` have no confirmations yet and are
    // reported as unconfirmed.
    for credit in unspent_outputs(db)? {
        if credit.block.is_none() {
            balances.unconfirmed += credit.amount;
        } else if is_included(
            BalanceFilter::Immature,
            &credit,
            0,
            sync_height,
            coinbase_maturity,
        ) {
            balances.immature += credit.amount;
        } else if credit.confirmations(sync_height) >= 1 {
            balances.confirmed += credit.amount;
        } else {
            balances.unconfirmed += credit.amount;
        }
    }

    balances.total = balances.confirmed + balances.unconfirmed + balances.immature;

    Ok(balances)
}

pub(crate) fn unmined_tx_hashes(db: &impl KvRead) -> Result<Vec<Txid>> {
    db.scan_prefix(Column::Unmined, &[])?
        .into_iter()
        .map(|(key, _)| key_to_txid(&key))
        .collect()
}

pub(crate) fn unmined_txs(db: &impl KvRead) -> Result<Vec<TxRecord>> {
    unmined_tx_hashes(db)?
        .into_iter()
        .map(|txid| {
            db.tx_entry(&txid)?
                .ok_or_else(|| {
                    Error::Corrupted(format!("unmined transaction {txid} has no record"))
                })?
                .to_record(txid)
        })
        .collect()
}

pub(crate) fn unique_tx_details(
    db: &impl KvRead,
    txid: &Txid,
    block: Option<&IndexedBlock>,
) -> Result<TxDetails> {
    let entry = db.tx_entry(txid)?.ok_or(Error::TxNotFound(*txid))?;

    let stored = entry.block.map(|meta| meta.block);
    if let Some(expected) = block {
        if stored.as_ref() != Some(expected) {
            return Err(Error::BlockMismatch {
                txid: *txid,
                expected: *expected,
                stored,
            });
        }
    }

    let credits = db
        .credits_of(txid)?
        .into_iter()
        .map(|(outpoint, credit)| CreditStatus {
            index: outpoint.vout,
            amount: Amount::from_sat(credit.amount),
            change: credit.change,
            spent_by: credit.spent_by,
        })
        .collect();

    let debits = db
        .debits_of(txid)?
        .into_iter()
        .map(|(index, debit)| Debit {
            index,
            credit: debit.credit,
            amount: Amount::from_sat(debit.amount),
        })
        .collect();

    Ok(TxDetails {
        record: entry.to_record(*txid)?,
        block: entry.block,
        credits,
        debits,
    })
}

pub(crate) fn block_txs(db: &impl KvRead, height: u32) -> Result<Option<(BlockMeta, Vec<Txid>)>> {
    Ok(db
        .block_record(height)?
        .map(|record| (record.meta(height), record.txids)))
}
