use async_trait::async_trait;

use crate::{
    error::Result,
    record::{MigrationRecord, RecordList, RecordPatch, RecordQuery, WriteRecord},
};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;
#[cfg(any(feature = "pg", feature = "sqlite"))]
mod sql;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;
#[cfg(feature = "sqlite")]
pub use sqlite::*;

/// Storage of migration records plus the transactions that scope them.
///
/// Implementations must reject a second record with an existing name
/// atomically with respect to concurrent writers: `create` is the claim that
/// serializes runners, and it must fail with [`StoreError::UniqueViolation`]
/// when it loses.
///
/// Every method taking `tx` runs inside that transaction when one is given,
/// and as a standalone atomic operation otherwise.
///
/// [`StoreError::UniqueViolation`]: crate::StoreError::UniqueViolation
#[async_trait]
pub trait Engine: Clone + Send + Sync + 'static {
    /// Handle to an open unit of work. Dropping it without `commit` discards
    /// the writes made through it.
    type Transaction: Send;

    /// Provisions the record table if it does not exist yet.
    async fn setup(&self) -> Result<()>;

    /// Fails with [`StoreError::InvalidTableName`] unless `name` is a plain
    /// identifier, see [`schema::validate_table_name`].
    ///
    /// [`StoreError::InvalidTableName`]: crate::StoreError::InvalidTableName
    /// [`schema::validate_table_name`]: crate::schema::validate_table_name
    fn set_table_name(&mut self, name: &str) -> Result<()>;

    async fn begin(&self) -> Result<Self::Transaction>;

    async fn commit(&self, tx: Self::Transaction) -> Result<()>;

    async fn rollback(&self, tx: Self::Transaction) -> Result<()>;

    async fn create(
        &self,
        record: WriteRecord,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<MigrationRecord>;

    async fn get(
        &self,
        name: &'_ str,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Option<MigrationRecord>>;

    /// Records matching `query`, ordered by name ascending.
    async fn list(&self, query: RecordQuery) -> Result<RecordList>;

    async fn update(
        &self,
        name: &'_ str,
        patch: RecordPatch,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<MigrationRecord>;

    /// Deletes every record matching `query` and returns how many went.
    async fn delete(&self, query: RecordQuery, tx: Option<&mut Self::Transaction>) -> Result<u64>;
}
