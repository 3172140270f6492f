//! Wallet transaction store for Subcoin.
//!
//! This crate keeps track of every transaction relevant to a wallet, which of
//! their outputs belong to the wallet (credits) and which wallet outputs have
//! been consumed (debits). It answers balance and unspent-output queries under
//! a confirmation policy that honours coinbase maturity.
//!
//! ## Architecture
//!
//! - **Records**: transactions are stored once by txid, either confirmed in a
//!   block or sitting in the unmined pool.
//! - **Credit/debit index**: per-outpoint spend status, per-input debits and a
//!   reverse index of previous outpoints used for conflict detection.
//! - **Double-spend resolution**: a confirmed transaction evicts every unmined
//!   transaction that conflicts with it, together with all of their descendants.
//! - **Rollback**: retracting blocks demotes their transactions back to the
//!   unmined pool, or removes coinbases and everything built on top of them.
//!
//! Every mutation runs against a RocksDB snapshot plus its own pending changes
//! and is committed as a single `WriteBatch`, so readers never observe a
//! half-applied update.

mod conflict;
mod db;
mod entry;
mod error;
mod index;
mod insert;
mod keys;
mod options;
mod query;
mod record;
mod rollback;
mod store;

pub use entry::Spender;
pub use error::Error;
pub use options::{TxStoreOptions, TxStoreOptionsBuilder};
pub use query::{BalanceFilter, Balances, Credit, CreditStatus, Debit, TxDetails};
pub use record::{BlockMeta, IndexedBlock, TxRecord};
pub use store::TxStore;

/// Result type for wallet transaction store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coinbase outputs need this many confirmations before they can be spent.
pub const DEFAULT_COINBASE_MATURITY: u32 = 100;

/// Version of the on-disk layout, bumped on incompatible changes.
pub const STORE_VERSION: u32 = 1;

/// Column families of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Column {
    /// Key: txid (32 bytes)
    /// Value: TxEntry (serialized)
    Txs,
    /// Key: block height (u32, big-endian)
    /// Value: BlockRecord (serialized)
    Blocks,
    /// Key: txid (32 bytes)
    /// Value: empty
    Unmined,
    /// Key: OutPoint (txid || vout) = 36 bytes
    /// Value: CreditEntry (serialized)
    Credits,
    /// Key: spender txid (32 bytes) || input index (u32, big-endian)
    /// Value: DebitEntry (serialized)
    Debits,
    /// Key: previous OutPoint (36 bytes) || spender txid (32 bytes)
    /// Value: input index (u32, little-endian)
    Spends,
    /// Keys: "version"
    Meta,
}

impl Column {
    pub(crate) const ALL: [Column; 7] = [
        Column::Txs,
        Column::Blocks,
        Column::Unmined,
        Column::Credits,
        Column::Debits,
        Column::Spends,
        Column::Meta,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Column::Txs => "txs",
            Column::Blocks => "blocks",
            Column::Unmined => "unmined",
            Column::Credits => "credits",
            Column::Debits => "debits",
            Column::Spends => "spends",
            Column::Meta => "meta",
        }
    }
}

/// Metadata keys.
mod meta_keys {
    pub const VERSION: &[u8] = b"version";
}
