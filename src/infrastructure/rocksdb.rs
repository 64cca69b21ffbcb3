use super::ledger::{KvBackend, Ledger, Put, Table};
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// A persistent key/value backend using RocksDB.
///
/// Every [`Table`] is its own Column Family. A committed unit of work becomes
/// a single `WriteBatch`, so it is applied atomically even across families.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBBackend {
    db: Arc<DB>,
}

impl RocksDBBackend {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that a column family exists for every table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = Table::ALL
            .iter()
            .map(|table| ColumnFamilyDescriptor::new(table.name(), Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, table: Table) -> Result<&ColumnFamily> {
        self.db.cf_handle(table.name()).ok_or_else(|| {
            SettlementError::internal(format!("{} column family not found", table.name()))
        })
    }
}

#[async_trait]
impl KvBackend for RocksDBBackend {
    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(table)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    async fn scan(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(table)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    async fn write(&self, batch: Vec<Put>) -> Result<()> {
        let mut write_batch = WriteBatch::default();
        for (table, key, value) in batch {
            write_batch.put_cf(self.cf(table)?, key, value);
        }
        self.db.write(write_batch)?;
        Ok(())
    }
}

/// Ledger persisted in a RocksDB directory.
pub type RocksDBLedger = Ledger<RocksDBBackend>;

impl RocksDBLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Ledger::with_backend(RocksDBBackend::open(path)?))
    }
}
