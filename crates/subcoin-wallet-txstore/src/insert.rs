//! Insertion of transactions and credits.

use crate::conflict::{evict_conflicts, resolve_debits};
use crate::db::WriteTxn;
use crate::entry::{BlockRecord, CreditEntry, TxEntry};
use crate::index::LedgerRead;
use crate::record::{BlockMeta, TxRecord};
use crate::rollback::detach_block;
use crate::{Error, Result};
use bitcoin::OutPoint;
use std::collections::HashSet;

/// Stores `record`, either in the unmined pool or confirmed in `block`.
pub(crate) fn insert_tx(
    txn: &mut WriteTxn<'_>,
    record: &TxRecord,
    block: Option<&BlockMeta>,
) -> Result<()> {
    record.check_txid()?;

    match block {
        Some(block) => insert_mined(txn, record, block),
        None => insert_unmined(txn, record),
    }
}

fn insert_unmined(txn: &mut WriteTxn<'_>, record: &TxRecord) -> Result<()> {
    let txid = record.txid;

    if txn.tx_entry(&txid)?.is_some() {
        return Ok(());
    }

    txn.put_tx_entry(&txid, &TxEntry::new(record, None))?;
    txn.set_unmined(&txid);
    txn.index_spends(&txid, &record.tx);

    resolve_debits(txn, txid, &record.tx, false)?;

    tracing::debug!("Inserted unmined transaction {txid}");

    Ok(())
}

fn insert_mined(txn: &mut WriteTxn<'_>, record: &TxRecord, block: &BlockMeta) -> Result<()> {
    let txid = record.txid;
    let height = block.height();

    if txn
        .tx_entry(&txid)?
        .and_then(|entry| entry.block)
        .is_some_and(|stored| stored.block == block.block)
    {
        return Ok(());
    }

    if let Some(stored) = txn.block_record(height)? {
        if stored.hash != block.hash() {
            let summary = detach_block(txn, height, Some(&txid))?;
            tracing::debug!(
                "Block {} replaces {} at #{height}: {} transaction(s) unmined, {} removed",
                block.hash(),
                stored.hash,
                summary.demoted,
                summary.removed
            );
        }
    }

    let existing = txn.tx_entry(&txid)?;

    // The first stored copy of a transaction is kept as is.
    let mut entry = match existing {
        Some(entry) => {
            match &entry.block {
                Some(old) => {
                    tracing::debug!("Moving {txid} from block {} to {}", old.block, block.block);
                    txn.remove_from_block(old.height(), &txid)?;
                }
                None => txn.clear_unmined(&txid),
            }
            entry
        }
        None => TxEntry::new(record, None),
    };
    entry.block = Some(*block);

    txn.put_tx_entry(&txid, &entry)?;
    txn.index_spends(&txid, &record.tx);

    let evicted = evict_conflicts(txn, txid, &record.tx)?;
    if !evicted.is_empty() {
        tracing::debug!("Evicted {evicted:?} in favour of {txid}");
    }

    let mut block_record = txn
        .block_record(height)?
        .unwrap_or_else(|| BlockRecord::new(block));
    if !block_record.txids.contains(&txid) {
        block_record.txids.push(txid);
    }
    txn.put_block_record(height, &block_record)?;

    resolve_debits(txn, txid, &record.tx, true)?;

    tracing::debug!("Inserted {txid} in block {}", block.block);

    Ok(())
}

/// Inserts several transactions confirmed in the same block.
///
/// Records are applied in slice order, so when two of them spend the same
/// credit the later one ends up holding the debit.
pub(crate) fn insert_block_txs(
    txn: &mut WriteTxn<'_>,
    block: &BlockMeta,
    records: &[TxRecord],
) -> Result<()> {
    for record in records {
        insert_tx(txn, record, Some(block))?;
    }
    Ok(())
}

/// Marks output `index` of `record` as a wallet credit.
///
/// Returns `false` if the credit already exists. When `block` is given it
/// must match the block the transaction is stored under.
pub(crate) fn add_credit(
    txn: &mut WriteTxn<'_>,
    record: &TxRecord,
    block: Option<&BlockMeta>,
    index: u32,
    change: bool,
) -> Result<bool> {
    record.check_txid()?;
    let txid = record.txid;

    let Some(txout) = record.tx.output.get(index as usize) else {
        return Err(Error::OutputIndexOutOfRange {
            txid,
            index,
            outputs: record.tx.output.len(),
        });
    };

    let Some(entry) = txn.tx_entry(&txid)? else {
        return Err(Error::TxNotInserted(txid));
    };

    if let Some(block) = block {
        let stored = entry.block.map(|meta| meta.block);
        if stored != Some(block.block) {
            return Err(Error::BlockMismatch {
                txid,
                expected: block.block,
                stored,
            });
        }
    }

    let outpoint = OutPoint { txid, vout: index };
    if txn.credit(&outpoint)?.is_some() {
        return Ok(false);
    }

    let credit = CreditEntry {
        amount: txout.value.to_sat(),
        is_coinbase: record.tx.is_coinbase(),
        change,
        script_pubkey: txout.script_pubkey.clone(),
        spent_by: None,
    };

    match txn.preferred_spender(&outpoint, &HashSet::new())? {
        Some(spender) => {
            tracing::debug!("New credit {outpoint} is already spent by {}", spender.txid);
            txn.install_debit(&outpoint, credit, spender)?;
        }
        None => txn.put_credit(&outpoint, &credit)?,
    }

    tracing::debug!("Added credit {outpoint}, amount: {}", txout.value);

    Ok(true)
}
