#![forbid(unsafe_code)]

mod engine;
mod error;
mod record;
pub mod schema;
mod store;

pub use engine::*;
pub use error::*;
pub use record::*;
pub use store::*;

/// Table used for migration records when no other name is configured.
pub const DEFAULT_TABLE_NAME: &str = "migrato_migrations";
