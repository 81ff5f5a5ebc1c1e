use migrato_store::StoreError;

use crate::validator::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The `up` or `down` handler of `name` failed. Displays as the handler's
    /// own error.
    #[error("{source}")]
    Handler {
        name: String,
        source: anyhow::Error,
    },

    #[error("migration `{0}` not found")]
    MigrationNotFound(String),

    #[error("migration `{0}` has no down handler")]
    MissingDown(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub(crate) fn handler(name: impl Into<String>, source: anyhow::Error) -> Self {
        Error::Handler {
            name: name.into(),
            source,
        }
    }

    /// Name of the migration whose handler failed.
    pub fn migration(&self) -> Option<&str> {
        match self {
            Error::Handler { name, .. } => Some(name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
