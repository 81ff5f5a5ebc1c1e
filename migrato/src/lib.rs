#![forbid(unsafe_code)]

pub mod config;
mod context;
mod error;
mod migration;
mod migrator;
mod runner;
mod validator;

pub use config::{Config, ConfigBuilder};
pub use context::*;
pub use error::*;
pub use migration::*;
pub use migrator::*;
pub use runner::*;
pub use validator::*;

pub use migrato_store as store;
pub use migrato_store::{Engine, MigrationRecord, MigrationStatus, Store, StoreError};
