use std::{collections::HashMap, path::Path, sync::Arc};

use log::error;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const POOLS: TableDefinition<u128, &[u8]> = TableDefinition::new("pools");

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database issue encountered: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transaction issue encountered: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("table issue encountered: {0}")]
    Table(#[from] redb::TableError),
    #[error("storage issue encountered: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("commit issue encountered: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// The locally persisted view of a pool resource. The daemon owns the truth;
/// this record exists so the identifier survives interruptions and deletion
/// can be retried after a partial creation.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PoolRecord {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub target_path: Option<String>,
    #[serde(default)]
    pub source_devices: Vec<String>,
    #[serde(default)]
    pub capacity: u64,
    #[serde(default)]
    pub allocation: u64,
    #[serde(default)]
    pub available: u64,
}

#[derive(Clone)]
pub struct PoolStore {
    database: Arc<Database>,
}

impl PoolStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let database = Database::create(path)?;
        let write = database.begin_write()?;
        let _ = write.open_table(POOLS);
        write.commit()?;
        Ok(PoolStore {
            database: Arc::new(database),
        })
    }

    pub async fn read(&self, id: Uuid) -> Result<Option<PoolRecord>, StoreError> {
        let read = self.database.begin_read()?;
        let table = read.open_table(POOLS)?;
        let Some(entry) = table.get(id.to_u128_le())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(entry.value())?))
    }

    pub async fn list(&self) -> Result<HashMap<Uuid, PoolRecord>, StoreError> {
        let mut pools: HashMap<Uuid, PoolRecord> = HashMap::new();
        let read = self.database.begin_read()?;
        let table = read.open_table(POOLS)?;
        for result in table.iter()? {
            let (key, value) = result?;
            let uuid = Uuid::from_u128_le(key.value());
            let record = match serde_json::from_slice(value.value()) {
                Ok(record) => record,
                Err(err) => {
                    error!("found invalid pool record in store for uuid {}: {}", uuid, err);
                    continue;
                }
            };
            pools.insert(uuid, record);
        }
        Ok(pools)
    }

    pub async fn update(&self, id: Uuid, record: PoolRecord) -> Result<(), StoreError> {
        let write = self.database.begin_write()?;
        {
            let mut table = write.open_table(POOLS)?;
            let bytes = serde_json::to_vec(&record)?;
            table.insert(id.to_u128_le(), bytes.as_slice())?;
        }
        write.commit()?;
        Ok(())
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        let write = self.database.begin_write()?;
        {
            let mut table = write.open_table(POOLS)?;
            table.remove(id.to_u128_le())?;
        }
        write.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> PoolRecord {
        PoolRecord {
            name: name.to_string(),
            kind: "dir".to_string(),
            target_path: Some(format!("/tmp/{}", name)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PoolStore::open(&dir.path().join("pools.db")).unwrap();
        let id = Uuid::new_v4();
        store.update(id, record("pool1")).await.unwrap();
        let loaded = store.read(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "pool1");
        assert_eq!(loaded.target_path.as_deref(), Some("/tmp/pool1"));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removal_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = PoolStore::open(&dir.path().join("pools.db")).unwrap();
        let id = Uuid::new_v4();
        store.update(id, record("pool1")).await.unwrap();
        store.remove(id).await.unwrap();
        assert!(store.read(id).await.unwrap().is_none());
        store.remove(id).await.unwrap();
    }
}
