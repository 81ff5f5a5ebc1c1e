use parking_lot::RwLock;
use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

/// Values shared with migration handlers, one per type.
///
/// This is the configuration API handed to every `up` and `down` handler. The
/// migrator never reads it.
#[derive(Default)]
pub struct Context {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Builder form of [`Context::insert`].
    pub fn with<T: Send + Sync + 'static>(mut self, val: T) -> Self {
        self.insert(val);

        self
    }

    /// Insert a value, returning the previous one of the same type.
    ///
    /// ```
    /// # use migrato::Context;
    /// let mut ctx = Context::new();
    /// assert_eq!(ctx.insert(1u32), None);
    /// assert_eq!(ctx.insert(2u32), Some(1u32));
    /// assert_eq!(ctx.get::<u32>(), Some(&2u32));
    /// ```
    pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(downcast_owned)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Like [`Context::get`] but panics when the value was never inserted.
    pub fn extract<T: 'static>(&self) -> &T {
        match self.get::<T>() {
            Some(v) => v,
            _ => {
                tracing::debug!(
                    "Failed to extract `{}` from the migration context. Register it with \
                     `Migrator::data()` before running migrations.",
                    type_name::<T>()
                );

                panic!(
                    "Requested migration data is not configured correctly. \
                     View/enable debug logs for more details."
                );
            }
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("len", &self.map.len())
            .finish()
    }
}

fn downcast_owned<T: Send + Sync + 'static>(boxed: Box<dyn Any + Send + Sync>) -> Option<T> {
    boxed.downcast().ok().map(|boxed| *boxed)
}

/// Cheap handle on the [`Context`] of a migrator, passed to handlers.
#[derive(Clone, Default)]
pub struct MigrationContext {
    inner: Arc<RwLock<Context>>,
}

impl MigrationContext {
    pub fn new(context: Context) -> Self {
        Self {
            inner: Arc::new(RwLock::new(context)),
        }
    }

    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.inner.read().get::<T>().cloned()
    }

    pub fn extract<T: Clone + 'static>(&self) -> T {
        self.inner.read().extract::<T>().clone()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.inner.read().contains::<T>()
    }

    pub(crate) fn insert<T: Send + Sync + 'static>(&self, val: T) -> Option<T> {
        self.inner.write().insert(val)
    }
}

impl fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MigrationContext")
            .field(&*self.inner.read())
            .finish()
    }
}
