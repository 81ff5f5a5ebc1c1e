//! Settings read by the migrator and the startup runner.
//!
//! [`Config`] deserializes with every field optional, so a host can load it
//! from whatever format it keeps its own settings in.

use migrato_store::DEFAULT_TABLE_NAME;
use serde::Deserialize;

/// Minutes after which a `RUNNING` record is considered abandoned.
pub const DEFAULT_STUCK_TIMEOUT_MINUTES: i64 = 30;

/// Longest migration name accepted, in characters.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch. A disabled runner never touches the store.
    pub enabled: bool,

    /// Run pending migrations from [`Runner::on_startup`](crate::Runner::on_startup).
    pub run_on_startup: bool,

    /// Run a whole batch in one transaction, all or nothing.
    pub use_transaction: bool,

    /// `None` falls back to [`DEFAULT_STUCK_TIMEOUT_MINUTES`].
    pub stuck_timeout_minutes: Option<i64>,

    pub max_name_length: usize,

    pub table_name: String,
}

impl Config {
    pub fn stuck_timeout(&self) -> i64 {
        self.stuck_timeout_minutes
            .unwrap_or(DEFAULT_STUCK_TIMEOUT_MINUTES)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            run_on_startup: false,
            use_transaction: true,
            stuck_timeout_minutes: None,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            table_name: DEFAULT_TABLE_NAME.to_owned(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, value: bool) -> Self {
        self.config.enabled = value;
        self
    }

    pub fn run_on_startup(mut self, value: bool) -> Self {
        self.config.run_on_startup = value;
        self
    }

    pub fn use_transaction(mut self, value: bool) -> Self {
        self.config.use_transaction = value;
        self
    }

    pub fn stuck_timeout_minutes(mut self, minutes: i64) -> Self {
        self.config.stuck_timeout_minutes = Some(minutes);
        self
    }

    pub fn max_name_length(mut self, len: usize) -> Self {
        self.config.max_name_length = len;
        self
    }

    pub fn table_name<N: Into<String>>(mut self, name: N) -> Self {
        self.config.table_name = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
