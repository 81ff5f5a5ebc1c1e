#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("migration record `{0}` already exists")]
    UniqueViolation(String),

    #[error("migration record `{0}` not found")]
    NotFound(String),

    #[error("invalid migration status `{0}`")]
    InvalidStatus(String),

    #[error("invalid table name `{0}`, expected letters, digits and underscores")]
    InvalidTableName(String),

    #[cfg(any(feature = "pg", feature = "sqlite"))]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

impl StoreError {
    /// Another writer already holds a record with the same name.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
