//! Error types for the wallet transaction store.

use crate::record::IndexedBlock;
use bitcoin::Txid;

/// Errors that can occur during wallet transaction store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    Rocksdb(#[from] rocksdb::Error),

    /// Bincode serialization/deserialization error.
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Raw transaction bytes could not be decoded.
    #[error("Failed to decode transaction: {0}")]
    Decode(#[from] bitcoin::consensus::encode::Error),

    /// The txid supplied with a record does not hash the transaction.
    #[error("Txid mismatch: record claims {claimed}, transaction hashes to {computed}")]
    TxidMismatch { claimed: Txid, computed: Txid },

    /// Credit requested for an output the transaction does not have.
    #[error("Output index {index} out of range for {txid} with {outputs} outputs")]
    OutputIndexOutOfRange {
        txid: Txid,
        index: u32,
        outputs: usize,
    },

    /// Credit requested for a transaction that was never inserted.
    #[error("Transaction {0} has not been inserted")]
    TxNotInserted(Txid),

    /// No transaction with this txid is stored.
    #[error("Transaction not found: {0}")]
    TxNotFound(Txid),

    /// The caller's block does not match the stored confirmation.
    #[error("Block mismatch for {txid}: expected {expected}, stored {stored:?}")]
    BlockMismatch {
        txid: Txid,
        expected: IndexedBlock,
        stored: Option<IndexedBlock>,
    },

    /// The database was written by an incompatible version.
    #[error("Unsupported store version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Stored data violates the layout invariants.
    #[error("Corrupted store: {0}")]
    Corrupted(String),

    /// Storage not initialized.
    #[error("Storage not initialized")]
    NotInitialized,
}
