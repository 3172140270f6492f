//! RocksDB access: snapshot readers and batched write transactions.

use crate::entry;
use crate::keys::{decode_u32, encode_u32};
use crate::options::TxStoreOptions;
use crate::{meta_keys, Column, Error, Result, STORE_VERSION};
use parking_lot::{Mutex, MutexGuard};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, Snapshot, WriteBatch,
    DB,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// Read access shared by snapshots and write transactions.
pub(crate) trait KvRead {
    fn get(&self, col: Column, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, col: Column, prefix: &[u8]) -> Result<KvPairs>;

    /// All entries with key >= `start`, in key order.
    fn scan_from(&self, col: Column, start: &[u8]) -> Result<KvPairs>;

    fn contains(&self, col: Column, key: &[u8]) -> Result<bool> {
        Ok(self.get(col, key)?.is_some())
    }
}

fn cf_handle(db: &DB, col: Column) -> Result<&ColumnFamily> {
    db.cf_handle(col.as_str()).ok_or(Error::NotInitialized)
}

fn snapshot_scan(
    db: &DB,
    snapshot: &Snapshot<'_>,
    col: Column,
    start: &[u8],
    prefix: &[u8],
) -> Result<KvPairs> {
    let cf = cf_handle(db, col)?;
    let mut out = Vec::new();
    for item in snapshot.iterator_cf(cf, IteratorMode::From(start, Direction::Forward)) {
        let (key, value) = item?;
        if !key.starts_with(prefix) {
            break;
        }
        out.push((key.into_vec(), value.into_vec()));
    }
    Ok(out)
}

/// Handle to the ledger database.
pub(crate) struct LedgerDb {
    db: DB,
    /// Serializes write transactions.
    write_lock: Mutex<()>,
}

impl LedgerDb {
    /// Open or create the database at the given path.
    pub fn open(path: &Path, options: &TxStoreOptions) -> Result<Self> {
        let db_opts = options.db_options();

        let cf_descriptors = Column::ALL
            .iter()
            .map(|col| ColumnFamilyDescriptor::new(col.as_str(), Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let ledger = Self {
            db,
            write_lock: Mutex::new(()),
        };
        ledger.check_version()?;

        Ok(ledger)
    }

    fn check_version(&self) -> Result<()> {
        let meta = cf_handle(&self.db, Column::Meta)?;
        match self.db.get_cf(meta, meta_keys::VERSION)? {
            Some(bytes) => {
                let found = decode_u32(&bytes)?;
                if found != STORE_VERSION {
                    return Err(Error::UnsupportedVersion {
                        found,
                        expected: STORE_VERSION,
                    });
                }
            }
            None => {
                self.db
                    .put_cf(meta, meta_keys::VERSION, encode_u32(STORE_VERSION))?;
            }
        }
        Ok(())
    }

    /// Consistent read view of the committed state.
    pub fn read(&self) -> ReadTxn<'_> {
        ReadTxn {
            db: &self.db,
            snapshot: self.db.snapshot(),
        }
    }

    /// Starts a write transaction, blocking while another one is open.
    pub fn write(&self) -> WriteTxn<'_> {
        let guard = self.write_lock.lock();
        WriteTxn {
            db: &self.db,
            snapshot: self.db.snapshot(),
            changes: HashMap::new(),
            _guard: guard,
        }
    }
}

/// Read-only view over a RocksDB snapshot.
pub(crate) struct ReadTxn<'a> {
    db: &'a DB,
    snapshot: Snapshot<'a>,
}

impl KvRead for ReadTxn<'_> {
    fn get(&self, col: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = cf_handle(self.db, col)?;
        Ok(self.snapshot.get_cf(cf, key)?)
    }

    fn scan_prefix(&self, col: Column, prefix: &[u8]) -> Result<KvPairs> {
        snapshot_scan(self.db, &self.snapshot, col, prefix, prefix)
    }

    fn scan_from(&self, col: Column, start: &[u8]) -> Result<KvPairs> {
        snapshot_scan(self.db, &self.snapshot, col, start, &[])
    }
}

/// Pending changes layered over a snapshot.
///
/// Reads see the transaction's own writes. Nothing reaches the database until
/// [`WriteTxn::commit`]; dropping the transaction discards every change.
pub(crate) struct WriteTxn<'a> {
    db: &'a DB,
    snapshot: Snapshot<'a>,
    /// `None` marks a deletion.
    changes: HashMap<Column, BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
    _guard: MutexGuard<'a, ()>,
}

impl WriteTxn<'_> {
    pub fn put(&mut self, col: Column, key: &[u8], value: Vec<u8>) {
        self.changes
            .entry(col)
            .or_default()
            .insert(key.to_vec(), Some(value));
    }

    pub fn put_entry<T: Serialize>(&mut self, col: Column, key: &[u8], value: &T) -> Result<()> {
        let bytes = entry::encode(value)?;
        self.put(col, key, bytes);
        Ok(())
    }

    pub fn delete(&mut self, col: Column, key: &[u8]) {
        self.changes
            .entry(col)
            .or_default()
            .insert(key.to_vec(), None);
    }

    /// Number of keys touched so far.
    pub fn pending(&self) -> usize {
        self.changes.values().map(BTreeMap::len).sum()
    }

    /// Writes every pending change atomically.
    pub fn commit(self) -> Result<()> {
        if self.changes.is_empty() {
            return Ok(());
        }

        let mut batch = WriteBatch::default();
        for (col, changes) in &self.changes {
            let cf = cf_handle(self.db, *col)?;
            for (key, value) in changes {
                match value {
                    Some(value) => batch.put_cf(cf, key, value),
                    None => batch.delete_cf(cf, key),
                }
            }
        }

        self.db.write(batch)?;

        Ok(())
    }

    fn merge_overlay(
        &self,
        col: Column,
        base: KvPairs,
        start: &[u8],
        prefix: &[u8],
    ) -> KvPairs {
        let Some(overlay) = self.changes.get(&col) else {
            return base;
        };

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = base.into_iter().collect();
        for (key, value) in overlay.range(start.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }
}

impl KvRead for WriteTxn<'_> {
    fn get(&self, col: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.changes.get(&col).and_then(|changes| changes.get(key)) {
            return Ok(value.clone());
        }
        let cf = cf_handle(self.db, col)?;
        Ok(self.snapshot.get_cf(cf, key)?)
    }

    fn scan_prefix(&self, col: Column, prefix: &[u8]) -> Result<KvPairs> {
        let base = snapshot_scan(self.db, &self.snapshot, col, prefix, prefix)?;
        Ok(self.merge_overlay(col, base, prefix, prefix))
    }

    fn scan_from(&self, col: Column, start: &[u8]) -> Result<KvPairs> {
        let base = snapshot_scan(self.db, &self.snapshot, col, start, &[])?;
        Ok(self.merge_overlay(col, base, start, &[]))
    }
}
