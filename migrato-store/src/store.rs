use crate::{
    engine::Engine,
    error::Result,
    record::{MigrationRecord, MigrationStatus, RecordList, RecordPatch, RecordQuery, WriteRecord},
};

#[derive(Debug, Clone)]
pub struct Store<E>(pub(crate) E);

impl<E: Engine> From<E> for Store<E> {
    fn from(engine: E) -> Self {
        Store(engine)
    }
}

impl<E: Engine> Store<E> {
    pub fn from_engine(engine: E) -> Self {
        Store(engine)
    }

    pub fn engine(&self) -> &E {
        &self.0
    }

    pub fn table_name(mut self, name: impl AsRef<str>) -> Result<Self> {
        self.0.set_table_name(name.as_ref())?;

        Ok(self)
    }

    pub async fn setup(&self) -> Result<()> {
        self.0.setup().await
    }

    pub async fn begin(&self) -> Result<E::Transaction> {
        self.0.begin().await
    }

    pub async fn commit(&self, tx: E::Transaction) -> Result<()> {
        self.0.commit(tx).await
    }

    pub async fn rollback(&self, tx: E::Transaction) -> Result<()> {
        self.0.rollback(tx).await
    }

    pub async fn create(
        &self,
        record: WriteRecord,
        tx: Option<&mut E::Transaction>,
    ) -> Result<MigrationRecord> {
        self.0.create(record, tx).await
    }

    pub async fn get(
        &self,
        name: &str,
        tx: Option<&mut E::Transaction>,
    ) -> Result<Option<MigrationRecord>> {
        self.0.get(name, tx).await
    }

    pub async fn list(&self, query: RecordQuery) -> Result<RecordList> {
        self.0.list(query).await
    }

    pub async fn update(
        &self,
        name: &str,
        patch: RecordPatch,
        tx: Option<&mut E::Transaction>,
    ) -> Result<MigrationRecord> {
        self.0.update(name, patch, tx).await
    }

    pub async fn delete(&self, query: RecordQuery, tx: Option<&mut E::Transaction>) -> Result<u64> {
        self.0.delete(query, tx).await
    }

    /// Every record, ordered by name.
    pub async fn records(&self) -> Result<Vec<MigrationRecord>> {
        Ok(self.0.list(RecordQuery::new()).await?.items)
    }

    pub async fn records_with_status(&self, status: MigrationStatus) -> Result<Vec<MigrationRecord>> {
        Ok(self.0.list(RecordQuery::new().status(status)).await?.items)
    }
}
