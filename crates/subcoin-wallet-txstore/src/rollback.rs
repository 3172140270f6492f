//! Retraction of confirmed blocks.

use crate::conflict::purge;
use crate::db::{KvRead, WriteTxn};
use crate::entry::{decode, BlockRecord};
use crate::index::LedgerRead;
use crate::keys::{height_key, key_to_height};
use crate::{Column, Result};
use bitcoin::Txid;

/// Outcome of a rollback.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RollbackSummary {
    pub blocks: usize,
    pub demoted: usize,
    pub removed: usize,
}

/// Undoes every confirmation at or above `height`.
///
/// Regular transactions go back to the unmined pool with their credits and
/// debits intact. Coinbases are deleted together with everything spending
/// their outputs, including transactions demoted by this call.
pub(crate) fn rollback(txn: &mut WriteTxn<'_>, height: u32) -> Result<RollbackSummary> {
    let mut summary = RollbackSummary::default();
    let mut coinbases = Vec::new();

    for (key, value) in txn.scan_from(Column::Blocks, &height_key(height))? {
        let block_height = key_to_height(&key)?;
        let record: BlockRecord = decode(&value)?;
        unconfirm_block(txn, block_height, &record, None, &mut summary, &mut coinbases)?;
    }

    if !coinbases.is_empty() {
        summary.removed = purge(txn, coinbases)?.len();
    }

    Ok(summary)
}

/// Detaches the single block stored at `height`, as a rollback would.
///
/// `keep` is demoted even when it is a coinbase, so that it can be confirmed
/// again in a replacement block without losing its credits.
pub(crate) fn detach_block(
    txn: &mut WriteTxn<'_>,
    height: u32,
    keep: Option<&Txid>,
) -> Result<RollbackSummary> {
    let mut summary = RollbackSummary::default();
    let Some(record) = txn.block_record(height)? else {
        return Ok(summary);
    };

    let mut coinbases = Vec::new();
    unconfirm_block(txn, height, &record, keep, &mut summary, &mut coinbases)?;

    if !coinbases.is_empty() {
        summary.removed = purge(txn, coinbases)?.len();
    }

    Ok(summary)
}

fn unconfirm_block(
    txn: &mut WriteTxn<'_>,
    height: u32,
    record: &BlockRecord,
    keep: Option<&Txid>,
    summary: &mut RollbackSummary,
    coinbases: &mut Vec<Txid>,
) -> Result<()> {
    for txid in &record.txids {
        let Some(mut entry) = txn.tx_entry(txid)? else {
            tracing::warn!("Block #{height} lists unknown transaction {txid}");
            continue;
        };

        if keep != Some(txid) && entry.decode_tx()?.is_coinbase() {
            coinbases.push(*txid);
            continue;
        }

        entry.block = None;
        txn.put_tx_entry(txid, &entry)?;
        txn.set_unmined(txid);
        summary.demoted += 1;

        tracing::debug!("Moved {txid} from block #{height} to the unmined pool");
    }

    txn.delete_block_record(height);
    summary.blocks += 1;

    Ok(())
}
