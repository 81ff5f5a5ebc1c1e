use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;
use migrato_store::Engine;

use crate::context::MigrationContext;

/// Body of an `up` or `down` step.
///
/// `tx` is the transaction the migrator runs the step in, if any. Writes that
/// must commit or roll back together with the migration record go through it.
/// With the memory engine an open transaction holds the store's write lock, so
/// a handler given a transaction must not touch the store without it.
#[async_trait]
pub trait MigrationHandler<E: Engine>: DynClone + Send + Sync {
    async fn handle(&self, ctx: &MigrationContext, tx: Option<&mut E::Transaction>) -> Result<()>;
}

dyn_clone::clone_trait_object!(<E> MigrationHandler<E> where E: Engine);

/// A named, one-time change. Names order execution, so give them a sortable
/// prefix such as `0001_`.
#[derive(Clone)]
pub struct Migration<E: Engine> {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) up: Option<Box<dyn MigrationHandler<E>>>,
    pub(crate) down: Option<Box<dyn MigrationHandler<E>>>,
}

impl<E: Engine> Migration<E> {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            description: None,
            up: None,
            down: None,
        }
    }

    pub fn description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = Some(description.into());

        self
    }

    pub fn up<H: MigrationHandler<E> + 'static>(mut self, handler: H) -> Self {
        self.up = Some(Box::new(handler));

        self
    }

    pub fn down<H: MigrationHandler<E> + 'static>(mut self, handler: H) -> Self {
        self.down = Some(Box::new(handler));

        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn has_up(&self) -> bool {
        self.up.is_some()
    }

    pub fn has_down(&self) -> bool {
        self.down.is_some()
    }
}

impl<E: Engine> fmt::Debug for Migration<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .finish()
    }
}
