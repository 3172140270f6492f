use crate::db::LedgerDb;
use crate::options::TxStoreOptions;
use crate::query::{self, BalanceFilter, Balances, Credit, TxDetails};
use crate::record::{BlockMeta, IndexedBlock, TxRecord};
use crate::{insert, rollback, Result};
use bitcoin::{Amount, Txid};
use std::path::Path;

/// Persistent transaction ledger of a wallet.
///
/// Every mutation is applied atomically: either all of its effects, including
/// double-spend evictions and cascading removals, are committed or none are.
/// Queries read from a consistent snapshot and never wait for writers.
pub struct TxStore {
    db: LedgerDb,
    options: TxStoreOptions,
}

impl TxStore {
    /// Open or create a store at the given path with default options.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_options(path, TxStoreOptions::default())
    }

    /// Open or create a store at the given path.
    pub fn open_with_options(path: &Path, options: TxStoreOptions) -> Result<Self> {
        let db = LedgerDb::open(path, &options)?;

        tracing::info!(
            "Opened wallet transaction store at {}, coinbase maturity: {}",
            path.display(),
            options.coinbase_maturity
        );

        Ok(Self { db, options })
    }

    pub fn options(&self) -> &TxStoreOptions {
        &self.options
    }

    /// Inserts a transaction, unmined when `block` is `None`.
    ///
    /// Inserting a confirmed transaction removes every unmined transaction
    /// that double spends one of its inputs, along with their descendants.
    /// Re-inserting an already known unmined transaction, or re-confirming one
    /// in the same block, does nothing.
    pub fn insert_tx(&self, record: &TxRecord, block: Option<&BlockMeta>) -> Result<()> {
        let mut txn = self.db.write();
        insert::insert_tx(&mut txn, record, block)?;
        txn.commit()
    }

    /// Inserts all `records` as confirmed in `block`, in one atomic write.
    pub fn insert_block_txs(&self, block: &BlockMeta, records: &[TxRecord]) -> Result<()> {
        let mut txn = self.db.write();
        insert::insert_block_txs(&mut txn, block, records)?;
        let pending = txn.pending();
        txn.commit()?;

        tracing::debug!(
            "Inserted {} transaction(s) in block {}, {pending} key(s) written",
            records.len(),
            block.block
        );

        Ok(())
    }

    /// Marks output `index` of an inserted transaction as belonging to the
    /// wallet.
    ///
    /// Returns `false` when the credit was already recorded.
    pub fn add_credit(
        &self,
        record: &TxRecord,
        block: Option<&BlockMeta>,
        index: u32,
        change: bool,
    ) -> Result<bool> {
        let mut txn = self.db.write();
        let added = insert::add_credit(&mut txn, record, block, index, change)?;
        txn.commit()?;
        Ok(added)
    }

    /// Removes every block at or above `height`.
    pub fn rollback(&self, height: u32) -> Result<()> {
        let mut txn = self.db.write();
        let summary = rollback::rollback(&mut txn, height)?;
        txn.commit()?;

        tracing::info!(
            "Rolled back to height {height}: {} block(s) detached, {} transaction(s) unmined, {} removed",
            summary.blocks,
            summary.demoted,
            summary.removed
        );

        Ok(())
    }

    /// Sum of the unspent credits selected by `filter` at `sync_height`.
    pub fn balance(
        &self,
        min_conf: u32,
        sync_height: u32,
        filter: BalanceFilter,
    ) -> Result<Amount> {
        query::balance(
            &self.db.read(),
            min_conf,
            sync_height,
            filter,
            self.options.coinbase_maturity,
        )
    }

    /// Confirmed, unconfirmed and immature balances at `sync_height`.
    pub fn balances(&self, sync_height: u32) -> Result<Balances> {
        query::balances(&self.db.read(), sync_height, self.options.coinbase_maturity)
    }

    /// All unspent credits, ignoring confirmation depth and maturity.
    pub fn unspent_outputs(&self) -> Result<Vec<Credit>> {
        query::unspent_outputs(&self.db.read())
    }

    /// Unmined transactions, ordered by txid.
    pub fn unmined_txs(&self) -> Result<Vec<TxRecord>> {
        query::unmined_txs(&self.db.read())
    }

    pub fn unmined_tx_hashes(&self) -> Result<Vec<Txid>> {
        query::unmined_tx_hashes(&self.db.read())
    }

    /// Details of a stored transaction.
    ///
    /// When `block` is given the transaction must be confirmed in it.
    pub fn unique_tx_details(
        &self,
        txid: &Txid,
        block: Option<&IndexedBlock>,
    ) -> Result<TxDetails> {
        query::unique_tx_details(&self.db.read(), txid, block)
    }

    /// The block stored at `height` and its transactions in insertion order.
    pub fn block_txs(&self, height: u32) -> Result<Option<(BlockMeta, Vec<Txid>)>> {
        query::block_txs(&self.db.read(), height)
    }
}
