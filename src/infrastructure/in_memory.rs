use super::ledger::{KvBackend, Ledger, Put, Table};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Rows = BTreeMap<Vec<u8>, Vec<u8>>;

/// A thread-safe in-memory key/value backend.
///
/// Uses `Arc<RwLock<HashMap<Table, BTreeMap<..>>>>` so a whole write batch is
/// applied under one write lock. Ideal for testing or when persistence is not
/// required.
#[derive(Default, Clone)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<HashMap<Table, Rows>>>,
}

impl InMemoryBackend {
    /// Creates a new, empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for InMemoryBackend {
    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tables = self.tables.read().await;
        Ok(tables.get(&table).and_then(|rows| rows.get(key)).cloned())
    }

    async fn scan(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn write(&self, batch: Vec<Put>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for (table, key, value) in batch {
            tables.entry(table).or_default().insert(key, value);
        }
        Ok(())
    }
}

/// Ledger kept entirely in process memory.
pub type InMemoryLedger = Ledger<InMemoryBackend>;

impl InMemoryLedger {
    pub fn new() -> Self {
        Ledger::with_backend(InMemoryBackend::new())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}
