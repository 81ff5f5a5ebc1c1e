use async_trait::async_trait;
use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
    sync::Arc,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    engine::Engine,
    error::{Result, StoreError},
    record::{MigrationRecord, RecordList, RecordPatch, RecordQuery, WriteRecord},
    schema,
    store::Store,
};

type Records = BTreeMap<String, MigrationRecord>;

pub type MemoryStore = Store<Memory>;

/// Records kept in process. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct Memory(Arc<RwLock<Records>>);

impl MemoryStore {
    pub fn new() -> Self {
        Store(Memory::default())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the write lock for its whole lifetime and works on a copy of the
/// records, swapped in on commit.
pub struct MemoryTransaction {
    guard: OwnedRwLockWriteGuard<Records>,
    records: Records,
}

impl fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("records", &self.records.len())
            .finish()
    }
}

#[async_trait]
impl Engine for Memory {
    type Transaction = MemoryTransaction;

    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    fn set_table_name(&mut self, name: &str) -> Result<()> {
        schema::validate_table_name(name)
    }

    async fn begin(&self) -> Result<MemoryTransaction> {
        let guard = self.0.clone().write_owned().await;
        let records = guard.clone();

        Ok(MemoryTransaction { guard, records })
    }

    async fn commit(&self, tx: MemoryTransaction) -> Result<()> {
        let MemoryTransaction { mut guard, records } = tx;
        *guard = records;

        Ok(())
    }

    async fn rollback(&self, tx: MemoryTransaction) -> Result<()> {
        drop(tx);

        Ok(())
    }

    async fn create(
        &self,
        record: WriteRecord,
        tx: Option<&mut MemoryTransaction>,
    ) -> Result<MigrationRecord> {
        match tx {
            Some(tx) => insert(&mut tx.records, record),
            _ => insert(&mut *self.0.write().await, record),
        }
    }

    async fn get(
        &self,
        name: &'_ str,
        tx: Option<&mut MemoryTransaction>,
    ) -> Result<Option<MigrationRecord>> {
        let record = match tx {
            Some(tx) => tx.records.get(name).cloned(),
            _ => self.0.read().await.get(name).cloned(),
        };

        Ok(record)
    }

    async fn list(&self, query: RecordQuery) -> Result<RecordList> {
        let items = self
            .0
            .read()
            .await
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect::<Vec<_>>();

        Ok(items.into())
    }

    async fn update(
        &self,
        name: &'_ str,
        patch: RecordPatch,
        tx: Option<&mut MemoryTransaction>,
    ) -> Result<MigrationRecord> {
        match tx {
            Some(tx) => patch_record(&mut tx.records, name, &patch),
            _ => patch_record(&mut *self.0.write().await, name, &patch),
        }
    }

    async fn delete(&self, query: RecordQuery, tx: Option<&mut MemoryTransaction>) -> Result<u64> {
        let deleted = match tx {
            Some(tx) => remove(&mut tx.records, &query),
            _ => remove(&mut *self.0.write().await, &query),
        };

        Ok(deleted)
    }
}

fn insert(records: &mut Records, record: WriteRecord) -> Result<MigrationRecord> {
    match records.entry(record.name.to_owned()) {
        Entry::Occupied(_) => Err(StoreError::UniqueViolation(record.name)),
        Entry::Vacant(entry) => Ok(entry.insert(record.to_record()).clone()),
    }
}

fn patch_record(records: &mut Records, name: &str, patch: &RecordPatch) -> Result<MigrationRecord> {
    let Some(record) = records.get_mut(name) else {
        return Err(StoreError::NotFound(name.to_owned()));
    };

    patch.apply(record);

    Ok(record.clone())
}

fn remove(records: &mut Records, query: &RecordQuery) -> u64 {
    let before = records.len();
    records.retain(|_, record| !query.matches(record));

    (before - records.len()) as u64
}
