use std::collections::{BTreeSet, HashSet};

use migrato_store::Engine;

use crate::migration::Migration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("migration names must not be empty")]
    EmptyName,

    #[error("duplicate migration names: {}", .0.join(", "))]
    DuplicateNames(Vec<String>),

    #[error("migration name `{name}` is longer than {max} characters")]
    NameTooLong { name: String, max: usize },

    #[error("migration `{0}` has no up handler")]
    MissingUp(String),
}

/// Rejects the whole batch when one definition is malformed. Nothing is read
/// from or written to the store.
///
/// Checks run in order: empty names, duplicates, length, missing `up`. Every
/// duplicated name is reported, once, sorted.
pub fn validate<E: Engine>(
    migrations: &[Migration<E>],
    max_name_length: usize,
) -> Result<(), ValidationError> {
    if migrations.iter().any(|m| m.name.trim().is_empty()) {
        return Err(ValidationError::EmptyName);
    }

    let mut seen = HashSet::new();
    let duplicates = migrations
        .iter()
        .filter(|m| !seen.insert(m.name.as_str()))
        .map(|m| m.name.to_owned())
        .collect::<BTreeSet<_>>();

    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicateNames(
            duplicates.into_iter().collect(),
        ));
    }

    if let Some(m) = migrations
        .iter()
        .find(|m| m.name.chars().count() > max_name_length)
    {
        return Err(ValidationError::NameTooLong {
            name: m.name.to_owned(),
            max: max_name_length,
        });
    }

    if let Some(m) = migrations.iter().find(|m| m.up.is_none()) {
        return Err(ValidationError::MissingUp(m.name.to_owned()));
    }

    Ok(())
}
