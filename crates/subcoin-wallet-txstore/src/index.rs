//! Typed access to the credit, debit, spend and unmined partitions.

use crate::db::{KvRead, WriteTxn};
use crate::entry::{decode, BlockRecord, CreditEntry, DebitEntry, Spender, TxEntry};
use crate::keys::{
    debit_key, decode_u32, encode_u32, height_key, key_to_debit_input, key_to_outpoint,
    key_to_spender, outpoint_to_key, spend_key, txid_key,
};
use crate::{Column, Result};
use bitcoin::{OutPoint, Transaction, Txid};
use std::collections::HashSet;

/// Typed reads, available on snapshots and write transactions alike.
pub(crate) trait LedgerRead: KvRead {
    fn tx_entry(&self, txid: &Txid) -> Result<Option<TxEntry>> {
        self.get(Column::Txs, &txid_key(txid))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn block_record(&self, height: u32) -> Result<Option<BlockRecord>> {
        self.get(Column::Blocks, &height_key(height))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn is_unmined(&self, txid: &Txid) -> Result<bool> {
        self.contains(Column::Unmined, &txid_key(txid))
    }

    fn credit(&self, outpoint: &OutPoint) -> Result<Option<CreditEntry>> {
        self.get(Column::Credits, &outpoint_to_key(outpoint))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Credits of a transaction, ordered by output index.
    fn credits_of(&self, txid: &Txid) -> Result<Vec<(OutPoint, CreditEntry)>> {
        let mut credits = self
            .scan_prefix(Column::Credits, &txid_key(txid))?
            .into_iter()
            .map(|(key, value)| Ok((key_to_outpoint(&key)?, decode(&value)?)))
            .collect::<Result<Vec<(OutPoint, CreditEntry)>>>()?;
        credits.sort_by_key(|(outpoint, _)| outpoint.vout);
        Ok(credits)
    }

    /// Debits of a transaction, ordered by input index.
    fn debits_of(&self, txid: &Txid) -> Result<Vec<(u32, DebitEntry)>> {
        self.scan_prefix(Column::Debits, &txid_key(txid))?
            .into_iter()
            .map(|(key, value)| Ok((key_to_debit_input(&key)?, decode(&value)?)))
            .collect()
    }

    /// Every stored transaction input spending `outpoint`, ordered by txid.
    fn spenders_of(&self, outpoint: &OutPoint) -> Result<Vec<Spender>> {
        self.scan_prefix(Column::Spends, &outpoint_to_key(outpoint))?
            .into_iter()
            .map(|(key, value)| {
                Ok(Spender {
                    txid: key_to_spender(&key)?,
                    input: decode_u32(&value)?,
                })
            })
            .collect()
    }

    /// The spender a credit is attributed to when several stored
    /// transactions spend it: a confirmed one first, otherwise the most
    /// recently received.
    fn preferred_spender(
        &self,
        outpoint: &OutPoint,
        excluded: &HashSet<Txid>,
    ) -> Result<Option<Spender>> {
        let mut best: Option<((bool, u64, Txid), Spender)> = None;
        for spender in self.spenders_of(outpoint)? {
            if excluded.contains(&spender.txid) {
                continue;
            }
            let Some(entry) = self.tx_entry(&spender.txid)? else {
                tracing::warn!(
                    "Spend index references missing transaction {} for {outpoint}",
                    spender.txid
                );
                continue;
            };
            let rank = (entry.is_mined(), entry.received, spender.txid);
            if best.as_ref().is_none_or(|(best_rank, _)| rank > *best_rank) {
                best = Some((rank, spender));
            }
        }
        Ok(best.map(|(_, spender)| spender))
    }
}

impl<T: KvRead + ?Sized> LedgerRead for T {}

impl WriteTxn<'_> {
    pub fn put_tx_entry(&mut self, txid: &Txid, entry: &TxEntry) -> Result<()> {
        self.put_entry(Column::Txs, &txid_key(txid), entry)
    }

    pub fn delete_tx_entry(&mut self, txid: &Txid) {
        self.delete(Column::Txs, &txid_key(txid));
    }

    pub fn put_block_record(&mut self, height: u32, record: &BlockRecord) -> Result<()> {
        self.put_entry(Column::Blocks, &height_key(height), record)
    }

    pub fn delete_block_record(&mut self, height: u32) {
        self.delete(Column::Blocks, &height_key(height));
    }

    /// Removes `txid` from the block at `height`, dropping the block once empty.
    pub fn remove_from_block(&mut self, height: u32, txid: &Txid) -> Result<()> {
        let Some(mut record) = self.block_record(height)? else {
            return Ok(());
        };
        record.txids.retain(|t| t != txid);
        if record.txids.is_empty() {
            self.delete_block_record(height);
            Ok(())
        } else {
            self.put_block_record(height, &record)
        }
    }

    pub fn set_unmined(&mut self, txid: &Txid) {
        self.put(Column::Unmined, &txid_key(txid), Vec::new());
    }

    pub fn clear_unmined(&mut self, txid: &Txid) {
        self.delete(Column::Unmined, &txid_key(txid));
    }

    pub fn put_credit(&mut self, outpoint: &OutPoint, credit: &CreditEntry) -> Result<()> {
        self.put_entry(Column::Credits, &outpoint_to_key(outpoint), credit)
    }

    pub fn delete_credit(&mut self, outpoint: &OutPoint) {
        self.delete(Column::Credits, &outpoint_to_key(outpoint));
    }

    pub fn put_debit(&mut self, spender: &Spender, debit: &DebitEntry) -> Result<()> {
        self.put_entry(Column::Debits, &debit_key(&spender.txid, spender.input), debit)
    }

    pub fn delete_debit(&mut self, spender: &Spender) {
        self.delete(Column::Debits, &debit_key(&spender.txid, spender.input));
    }

    /// Records every input of `tx` in the spend index.
    pub fn index_spends(&mut self, txid: &Txid, tx: &Transaction) {
        if tx.is_coinbase() {
            return;
        }
        for (input, txin) in tx.input.iter().enumerate() {
            self.put(
                Column::Spends,
                &spend_key(&txin.previous_output, txid),
                encode_u32(input as u32).to_vec(),
            );
        }
    }

    pub fn unindex_spends(&mut self, txid: &Txid, tx: &Transaction) {
        if tx.is_coinbase() {
            return;
        }
        for txin in &tx.input {
            self.delete(Column::Spends, &spend_key(&txin.previous_output, txid));
        }
    }

    /// Marks `credit` spent by `spender` and writes the matching debit.
    pub fn install_debit(
        &mut self,
        outpoint: &OutPoint,
        mut credit: CreditEntry,
        spender: Spender,
    ) -> Result<()> {
        let debit = DebitEntry {
            credit: *outpoint,
            amount: credit.amount,
        };
        credit.spent_by = Some(spender);
        self.put_credit(outpoint, &credit)?;
        self.put_debit(&spender, &debit)
    }
}
