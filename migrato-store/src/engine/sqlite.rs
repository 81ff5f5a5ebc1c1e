use async_trait::async_trait;
use sqlx::{SqlitePool, Transaction};

use crate::{
    engine::{sql, Engine},
    error::{Result, StoreError},
    record::{MigrationRecord, RecordList, RecordPatch, RecordQuery, WriteRecord},
    schema::{self, Dialect},
    store::Store,
    DEFAULT_TABLE_NAME,
};

pub type SqliteStore = Store<Sqlite>;

impl SqliteStore {
    pub fn new(pool: &SqlitePool) -> Self {
        Store(Sqlite {
            pool: pool.clone(),
            table: DEFAULT_TABLE_NAME.to_owned(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Sqlite {
    pool: SqlitePool,
    table: String,
}

impl Sqlite {
    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl Engine for Sqlite {
    type Transaction = Transaction<'static, sqlx::Sqlite>;

    async fn setup(&self) -> Result<()> {
        sqlx::query(&schema::create_table(&self.table, Dialect::Sqlite))
            .execute(&self.pool)
            .await?;

        sqlx::query(&schema::create_status_index(&self.table))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn set_table_name(&mut self, name: &str) -> Result<()> {
        schema::validate_table_name(name)?;
        self.table = name.to_owned();

        Ok(())
    }

    async fn begin(&self) -> Result<Self::Transaction> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<()> {
        tx.commit().await?;

        Ok(())
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<()> {
        tx.rollback().await?;

        Ok(())
    }

    async fn create(
        &self,
        record: WriteRecord,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<MigrationRecord> {
        let table = &self.table;
        let record = record.to_record();

        // A conflicting insert returns no row.
        let statement = format!(
            r#"
            INSERT INTO {table} ({})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (name) DO NOTHING
            RETURNING {}
            "#,
            sql::COLUMNS,
            sql::COLUMNS
        );

        let query = sqlx::query_as::<_, sql::RecordRow>(&statement)
            .bind(record.id)
            .bind(record.name.to_owned())
            .bind(record.status.as_str())
            .bind(record.started_at)
            .bind(record.executed_at)
            .bind(record.failed_at)
            .bind(record.created_at)
            .bind(record.updated_at);

        let row = match tx {
            Some(tx) => query.fetch_optional(&mut **tx).await,
            _ => query.fetch_optional(&self.pool).await,
        }
        .map_err(|err| sql::claim_error(err, &record.name))?;

        match row {
            Some(row) => row.try_into(),
            _ => Err(StoreError::UniqueViolation(record.name)),
        }
    }

    async fn get(
        &self,
        name: &'_ str,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Option<MigrationRecord>> {
        let mut builder =
            sql::select::<sqlx::Sqlite>(&self.table, &RecordQuery::new().name(name));
        let query = builder.build_query_as::<sql::RecordRow>();

        let row = match tx {
            Some(tx) => query.fetch_optional(&mut **tx).await?,
            _ => query.fetch_optional(&self.pool).await?,
        };

        row.map(MigrationRecord::try_from).transpose()
    }

    async fn list(&self, query: RecordQuery) -> Result<RecordList> {
        let rows = sql::select::<sqlx::Sqlite>(&self.table, &query)
            .build_query_as::<sql::RecordRow>()
            .fetch_all(&self.pool)
            .await?;

        sql::into_list(rows)
    }

    async fn update(
        &self,
        name: &'_ str,
        patch: RecordPatch,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<MigrationRecord> {
        let mut builder = sql::update::<sqlx::Sqlite>(&self.table, name, &patch);
        let query = builder.build_query_as::<sql::RecordRow>();

        let row = match tx {
            Some(tx) => query.fetch_optional(&mut **tx).await?,
            _ => query.fetch_optional(&self.pool).await?,
        };

        match row {
            Some(row) => row.try_into(),
            _ => Err(StoreError::NotFound(name.to_owned())),
        }
    }

    async fn delete(&self, query: RecordQuery, tx: Option<&mut Self::Transaction>) -> Result<u64> {
        let mut builder = sql::delete::<sqlx::Sqlite>(&self.table, &query);
        let query = builder.build();

        let result = match tx {
            Some(tx) => query.execute(&mut **tx).await?,
            _ => query.execute(&self.pool).await?,
        };

        Ok(result.rows_affected())
    }
}
