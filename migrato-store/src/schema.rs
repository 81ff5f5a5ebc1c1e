//! Shape of the migration record table.
//!
//! SQL engines render their `CREATE TABLE` statement from [`RECORD_FIELDS`]
//! so every backend stores the same columns with the same constraints. The
//! unique `name` column is what makes the insert of a `RUNNING` record usable
//! as a claim between concurrent runners.

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Uuid,
    Text,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
}

impl Field {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            unique: false,
            primary_key: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

pub const RECORD_FIELDS: &[Field] = &[
    Field::new("id", FieldType::Uuid).primary_key(),
    Field::new("name", FieldType::Text).unique(),
    Field::new("status", FieldType::Text),
    Field::new("started_at", FieldType::Timestamp).nullable(),
    Field::new("executed_at", FieldType::Timestamp).nullable(),
    Field::new("failed_at", FieldType::Timestamp).nullable(),
    Field::new("created_at", FieldType::Timestamp),
    Field::new("updated_at", FieldType::Timestamp),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn column_type(&self, ty: FieldType) -> &'static str {
        match (self, ty) {
            (Dialect::Postgres, FieldType::Uuid) => "UUID",
            (Dialect::Postgres, FieldType::Text) => "TEXT",
            (Dialect::Postgres, FieldType::Timestamp) => "TIMESTAMPTZ",
            (Dialect::Sqlite, FieldType::Uuid) => "BLOB",
            (Dialect::Sqlite, FieldType::Text) => "TEXT",
            (Dialect::Sqlite, FieldType::Timestamp) => "TEXT",
        }
    }
}

/// Table names are spliced into statements, so only `[A-Za-z_][A-Za-z0-9_]*`
/// is accepted.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();

    let valid = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(StoreError::InvalidTableName(name.to_owned()));
    }

    Ok(())
}

fn column(field: &Field, dialect: Dialect) -> String {
    let mut column = format!("{} {}", field.name, dialect.column_type(field.ty));

    if field.primary_key {
        column.push_str(" PRIMARY KEY");
    } else if !field.nullable {
        column.push_str(" NOT NULL");
    }

    if field.unique {
        column.push_str(" UNIQUE");
    }

    column
}

pub fn create_table(table: &str, dialect: Dialect) -> String {
    let columns = RECORD_FIELDS
        .iter()
        .map(|field| column(field, dialect))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE IF NOT EXISTS {table} ({columns})")
}

/// Index backing the `RUNNING`/`FAILED` scans done on every run.
pub fn create_status_index(table: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_status ON {table} (status)")
}
