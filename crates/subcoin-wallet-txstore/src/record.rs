//! Transaction records and confirmation points.

use crate::{Error, Result};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Transaction, Txid};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A block identified by its height and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedBlock {
    /// Block height.
    pub height: u32,
    /// Block hash.
    pub hash: BlockHash,
}

impl std::fmt::Display for IndexedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{},{}", self.height, self.hash)
    }
}

impl Default for IndexedBlock {
    fn default() -> Self {
        Self {
            height: 0u32,
            hash: BlockHash::all_zeros(),
        }
    }
}

/// Block in which a transaction was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Height and hash of the block.
    pub block: IndexedBlock,
    /// Block header timestamp.
    pub time: u32,
}

impl BlockMeta {
    /// Constructs a new instance of [`BlockMeta`].
    pub fn new(height: u32, hash: BlockHash, time: u32) -> Self {
        Self {
            block: IndexedBlock { height, hash },
            time,
        }
    }

    /// Returns the block height.
    pub fn height(&self) -> u32 {
        self.block.height
    }

    /// Returns the block hash.
    pub fn hash(&self) -> BlockHash {
        self.block.hash
    }
}

/// A decoded transaction as handed to the store.
///
/// The serialized form is optional: records built by a decoder usually keep
/// the raw bytes around, records built from an in-memory transaction may not.
/// The store always persists the consensus encoding and re-attaches it when a
/// record is read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    /// Transaction hash.
    pub txid: Txid,
    /// Unix timestamp (seconds) at which the wallet first saw the transaction.
    pub received: u64,
    /// Consensus serialization of the transaction, if known.
    pub serialized: Option<Vec<u8>>,
    /// Decoded transaction.
    pub tx: Transaction,
}

impl TxRecord {
    /// Creates a record from an in-memory transaction.
    ///
    /// The serialized form is computed eagerly.
    pub fn new(tx: Transaction, received: u64) -> Self {
        let serialized = bitcoin::consensus::serialize(&tx);
        Self {
            txid: tx.compute_txid(),
            received,
            serialized: Some(serialized),
            tx,
        }
    }

    /// Creates a record stamped with the current system time.
    pub fn received_now(tx: Transaction) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::new(tx, now)
    }

    /// Decodes a record from its consensus serialization.
    pub fn from_raw(raw: &[u8], received: u64) -> Result<Self> {
        let tx: Transaction = bitcoin::consensus::deserialize(raw)?;
        Ok(Self {
            txid: tx.compute_txid(),
            received,
            serialized: Some(raw.to_vec()),
            tx,
        })
    }

    /// Assembles a record from a decoder that already computed the txid.
    ///
    /// The txid is not checked here; the store rejects records whose txid
    /// does not hash the transaction.
    pub fn from_parts(
        txid: Txid,
        tx: Transaction,
        serialized: Option<Vec<u8>>,
        received: u64,
    ) -> Self {
        Self {
            txid,
            received,
            serialized,
            tx,
        }
    }

    /// Drops the cached serialization.
    pub fn without_serialized(mut self) -> Self {
        self.serialized = None;
        self
    }

    /// Returns the consensus serialization, computing it when absent.
    pub fn serialized_tx(&self) -> Vec<u8> {
        match &self.serialized {
            Some(raw) => raw.clone(),
            None => bitcoin::consensus::serialize(&self.tx),
        }
    }

    /// Whether this is a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.tx.is_coinbase()
    }

    /// Ensures the txid really is the hash of the transaction.
    pub(crate) fn check_txid(&self) -> Result<()> {
        let computed = self.tx.compute_txid();
        if computed != self.txid {
            return Err(Error::TxidMismatch {
                claimed: self.txid,
                computed,
            });
        }
        Ok(())
    }
}
