//! Pool facade
//!
//! A [`Pool`] owns the connection pool and the collection registry. Model
//! types are registered through it, producing [`Collection`] handles that
//! share its connections.
//!
//! ```ignore
//! let pool = Pool::in_memory();
//! let people = pool.new_collection::<Person>()?;
//! people.save(&mut person)?;
//! ```

use crate::collection::Collection;
use crate::config::{ConfigError, ModelConfig};
use crate::registry::Registry;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use strata_model_core::codec::Fallback;
use strata_model_core::key;
use strata_model_core::{Model, SchemaCache, SchemaError};
use strata_model_storage::{Backend, ConnectionPool, MemoryBackend, RedisBackend, DEFAULT_MAX_IDLE};
use tracing::info;

/// Registration options for one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Logical name; the model's name when `None`
    pub name: Option<String>,
    /// Codec for fields without a native representation
    pub fallback: Fallback,
    /// Maintain the `{collection}:all` membership set
    pub index: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            name: None,
            fallback: Fallback::default(),
            index: true,
        }
    }
}

impl CollectionOptions {
    /// Override the logical name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Select the fallback codec
    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Enable or disable the membership set
    pub fn with_index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }
}

/// Connections plus the collections registered over them
pub struct Pool {
    connections: Arc<ConnectionPool>,
    registry: Mutex<Registry>,
    defaults: CollectionOptions,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("connections", &self.connections)
            .field("collections", &self.registry.lock().names())
            .finish()
    }
}

impl Pool {
    /// Create a pool over `backend`
    pub fn new(backend: Arc<dyn Backend>, max_idle: usize) -> Self {
        info!(
            target: "strata::model::pool",
            backend = %backend.describe(),
            max_idle,
            "Created pool"
        );
        Self {
            connections: Arc::new(ConnectionPool::new(backend, max_idle)),
            registry: Mutex::new(Registry::new()),
            defaults: CollectionOptions::default(),
        }
    }

    /// Create a pool over a fresh in-process keyspace
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), DEFAULT_MAX_IDLE)
    }

    /// Create a Redis-backed pool from configuration
    ///
    /// The collection defaults (fallback codec, membership set) come from
    /// the `[collections]` section.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let defaults = config.collection_options()?;
        let backend = RedisBackend::new(config.to_settings())?;
        Ok(Self::new(Arc::new(backend), config.store.max_idle).with_defaults(defaults))
    }

    /// Replace the options used by [`Pool::new_collection`]
    ///
    /// A name in `defaults` is ignored; each model keeps its own.
    pub fn with_defaults(mut self, defaults: CollectionOptions) -> Self {
        self.defaults = CollectionOptions {
            name: None,
            ..defaults
        };
        self
    }

    /// Register `M` with the default options
    pub fn new_collection<M: Model>(&self) -> Result<Collection<M>, SchemaError> {
        self.new_collection_with_options(self.defaults.clone())
    }

    /// Register `M`
    ///
    /// # Errors
    ///
    /// - any compilation error of `M`'s schema
    /// - `SchemaError::InvalidName` if the logical name cannot be a key prefix
    /// - `SchemaError::DuplicateName` / `SchemaError::DuplicateType` if the
    ///   name or the type is already registered on this pool
    pub fn new_collection_with_options<M: Model>(
        &self,
        options: CollectionOptions,
    ) -> Result<Collection<M>, SchemaError> {
        let compiled = SchemaCache::global().get_or_compile::<M>()?;
        let spec = compiled.with_options(options.name.as_deref(), options.fallback);
        let schema = spec.schema();
        key::validate_collection_name(schema.name()).map_err(|reason| {
            SchemaError::InvalidName {
                name: schema.name().to_string(),
                reason,
            }
        })?;
        self.registry.lock().register(Arc::clone(schema))?;
        info!(
            target: "strata::model::pool",
            collection = schema.name(),
            model = schema.type_name(),
            fields = schema.len(),
            indexed = schema.indexed_fields().count(),
            fallback = %schema.fallback(),
            membership = options.index,
            "Registered collection"
        );
        Ok(Collection::new(spec, Arc::clone(&self.connections), options.index))
    }

    /// The shared connection pool
    pub fn connections(&self) -> &Arc<ConnectionPool> {
        &self.connections
    }

    /// Names of the registered collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        self.registry.lock().names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_model_core::FieldSet;

    #[derive(Default)]
    struct Ticket {
        id: String,
        title: String,
    }

    impl Model for Ticket {
        fn declare(fields: &mut FieldSet<Self>) {
            fields.scalar("Title", |t: &Self| &t.title, |t: &mut Self| &mut t.title);
        }

        fn model_id(&self) -> &str {
            &self.id
        }

        fn set_model_id(&mut self, id: String) {
            self.id = id;
        }
    }

    #[test]
    fn test_register_default_name() {
        let pool = Pool::in_memory();
        let tickets = pool.new_collection::<Ticket>().unwrap();
        assert_eq!(tickets.name(), "Ticket");
        assert!(tickets.is_indexed());
        assert_eq!(pool.collection_names(), vec!["Ticket".to_string()]);
    }

    #[test]
    fn test_register_twice_rejected() {
        let pool = Pool::in_memory();
        pool.new_collection::<Ticket>().unwrap();
        assert!(matches!(
            pool.new_collection::<Ticket>(),
            Err(SchemaError::DuplicateName { .. })
        ));
        assert!(matches!(
            pool.new_collection_with_options::<Ticket>(CollectionOptions::default().named("t")),
            Err(SchemaError::DuplicateType { .. })
        ));
    }

    #[test]
    fn test_pools_register_independently() {
        let a = Pool::in_memory();
        let b = Pool::in_memory();
        a.new_collection::<Ticket>().unwrap();
        b.new_collection::<Ticket>().unwrap();
    }

    #[test]
    fn test_invalid_name_rejected() {
        let pool = Pool::in_memory();
        let err = pool
            .new_collection_with_options::<Ticket>(CollectionOptions::default().named("a:b"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidName { ref name, .. } if name == "a:b"));
        assert!(pool.collection_names().is_empty());
    }

    #[test]
    fn test_options_applied() {
        let pool = Pool::in_memory().with_defaults(
            CollectionOptions::default()
                .named("ignored")
                .with_fallback(Fallback::Json)
                .with_index(false),
        );
        let tickets = pool.new_collection::<Ticket>().unwrap();
        assert_eq!(tickets.name(), "Ticket");
        assert_eq!(tickets.schema().fallback(), &Fallback::Json);
        assert!(!tickets.is_indexed());
    }
}
