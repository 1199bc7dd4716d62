//! stratamodel - Typed record mapping and secondary indexing over Redis
//!
//! A model type declares its persisted fields once; stratamodel compiles
//! that declaration into a schema and stores each record as a Redis hash,
//! with sorted-set indexes on the fields marked for indexing.
//!
//! # Quick Start
//!
//! ```ignore
//! use stratamodel::{FieldRange, FieldSet, Model, ModelConfig, Pool};
//!
//! #[derive(Default)]
//! struct Person {
//!     id: String,
//!     name: String,
//!     age: i64,
//! }
//!
//! impl Model for Person {
//!     fn declare(fields: &mut FieldSet<Self>) {
//!         fields.scalar("Name", |p: &Self| &p.name, |p: &mut Self| &mut p.name).index();
//!         fields.scalar("Age", |p: &Self| &p.age, |p: &mut Self| &mut p.age).index();
//!     }
//!
//!     fn model_id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn set_model_id(&mut self, id: String) {
//!         self.id = id;
//!     }
//! }
//!
//! let pool = Pool::from_config(&ModelConfig::from_file("stratamodel.toml".as_ref())?)?;
//! let people = pool.new_collection::<Person>()?;
//!
//! let mut ann = Person { name: "ann".into(), age: 31, ..Default::default() };
//! people.save(&mut ann)?;
//! let adults = people.find_in_range("Age", &FieldRange::numeric(18.0..))?;
//! ```
//!
//! # Architecture
//!
//! - `strata-model-core`: schemas, field classification and value codecs
//! - `strata-model-storage`: the command protocol and the Redis and
//!   in-memory backends
//! - `strata-model-engine`: collections, index maintenance and range queries

pub use strata_model_core::{
    compile, Fallback, FieldKind, FieldSet, FieldSpec, IndexKind, Model, ModelError, ModelResult,
    Schema, SchemaError, StoreError, StoreResult, ValueCodec,
};
pub use strata_model_engine::{
    generate_id, Collection, CollectionOptions, ConfigError, FieldRange, ModelConfig, Pool,
    CONFIG_FILE_NAME,
};
pub use strata_model_storage::{Backend, MemoryBackend, RedisBackend, RedisSettings};
