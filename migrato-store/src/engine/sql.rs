use chrono::{DateTime, Utc};
use sqlx::{Database, Encode, QueryBuilder, Type};
use uuid::Uuid;

use crate::{
    error::StoreError,
    record::{MigrationRecord, RecordList, RecordPatch, RecordQuery},
};

pub(crate) const COLUMNS: &str =
    "id, name, status, started_at, executed_at, failed_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for MigrationRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(MigrationRecord {
            id: row.id,
            status: row.status.parse()?,
            name: row.name,
            started_at: row.started_at,
            executed_at: row.executed_at,
            failed_at: row.failed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Sorted in Rust so the order is ordinal whatever the column collation is.
pub(crate) fn into_list(rows: Vec<RecordRow>) -> Result<RecordList, StoreError> {
    let mut items = rows
        .into_iter()
        .map(MigrationRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    items.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(items.into())
}

/// A duplicate key on insert is a lost claim, everything else stays a
/// database error.
pub(crate) fn claim_error(err: sqlx::Error, name: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::UniqueViolation(name.to_owned())
        }
        _ => StoreError::Sqlx(err),
    }
}

pub(crate) fn select<DB>(table: &str, query: &RecordQuery) -> QueryBuilder<'static, DB>
where
    DB: Database,
    DB::Arguments<'static>: Default,
    String: Encode<'static, DB> + Type<DB>,
{
    let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM {table}"));
    push_filters(&mut builder, query);

    builder
}

pub(crate) fn update<DB>(table: &str, name: &str, patch: &RecordPatch) -> QueryBuilder<'static, DB>
where
    DB: Database,
    DB::Arguments<'static>: Default,
    String: Encode<'static, DB> + Type<DB>,
    DateTime<Utc>: Encode<'static, DB> + Type<DB>,
{
    let mut builder = QueryBuilder::new(format!("UPDATE {table} SET updated_at = "));
    builder.push_bind(Utc::now());

    if let Some(status) = patch.status {
        builder
            .push(", status = ")
            .push_bind(status.as_str().to_owned());
    }

    if let Some(at) = patch.executed_at {
        builder.push(", executed_at = ").push_bind(at);
    }

    if let Some(at) = patch.failed_at {
        builder.push(", failed_at = ").push_bind(at);
    }

    builder
        .push(" WHERE name = ")
        .push_bind(name.to_owned())
        .push(format!(" RETURNING {COLUMNS}"));

    builder
}

pub(crate) fn delete<DB>(table: &str, query: &RecordQuery) -> QueryBuilder<'static, DB>
where
    DB: Database,
    DB::Arguments<'static>: Default,
    String: Encode<'static, DB> + Type<DB>,
{
    let mut builder = QueryBuilder::new(format!("DELETE FROM {table}"));
    push_filters(&mut builder, query);

    builder
}

fn push_filters<DB>(builder: &mut QueryBuilder<'static, DB>, query: &RecordQuery)
where
    DB: Database,
    String: Encode<'static, DB> + Type<DB>,
{
    let mut separator = " WHERE ";

    if let Some(name) = &query.name {
        builder
            .push(separator)
            .push("name = ")
            .push_bind(name.to_owned());
        separator = " AND ";
    }

    if let Some(status) = query.status {
        builder
            .push(separator)
            .push("status = ")
            .push_bind(status.as_str().to_owned());
    }
}
