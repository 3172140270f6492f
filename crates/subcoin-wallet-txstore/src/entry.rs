//! Values stored in the column families.

use crate::record::{BlockMeta, TxRecord};
use crate::Result;
use bitcoin::{BlockHash, OutPoint, ScriptBuf, Transaction, Txid};
use serde::{Deserialize, Serialize};

/// Value of the `txs` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TxEntry {
    pub received: u64,
    /// Consensus serialization of the transaction.
    pub raw: Vec<u8>,
    /// `None` while the transaction sits in the unmined pool.
    pub block: Option<BlockMeta>,
}

impl TxEntry {
    pub fn new(record: &TxRecord, block: Option<BlockMeta>) -> Self {
        Self {
            received: record.received,
            raw: record.serialized_tx(),
            block,
        }
    }

    pub fn decode_tx(&self) -> Result<Transaction> {
        Ok(bitcoin::consensus::deserialize(&self.raw)?)
    }

    pub fn to_record(&self, txid: Txid) -> Result<TxRecord> {
        Ok(TxRecord {
            txid,
            received: self.received,
            serialized: Some(self.raw.clone()),
            tx: self.decode_tx()?,
        })
    }

    pub fn is_mined(&self) -> bool {
        self.block.is_some()
    }
}

/// Value of the `blocks` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BlockRecord {
    pub hash: BlockHash,
    pub time: u32,
    /// Transactions in insertion order.
    pub txids: Vec<Txid>,
}

impl BlockRecord {
    pub fn new(meta: &BlockMeta) -> Self {
        Self {
            hash: meta.hash(),
            time: meta.time,
            txids: Vec::new(),
        }
    }

    pub fn meta(&self, height: u32) -> BlockMeta {
        BlockMeta::new(height, self.hash, self.time)
    }
}

/// Input of a stored transaction that consumes a credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spender {
    /// Spending transaction.
    pub txid: Txid,
    /// Input index within the spending transaction.
    pub input: u32,
}

/// Value of the `credits` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CreditEntry {
    pub amount: u64,
    pub is_coinbase: bool,
    pub change: bool,
    pub script_pubkey: ScriptBuf,
    pub spent_by: Option<Spender>,
}

/// Value of the `debits` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DebitEntry {
    pub credit: OutPoint,
    pub amount: u64,
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
