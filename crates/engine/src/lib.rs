//! Record engine for stratamodel
//!
//! This crate turns compiled schemas into persistence operations:
//! - Collection: save, find, delete and range queries for one model type
//! - Index: index entry maintenance for numeric, boolean and string fields
//! - Range: extraction of index ranges into sorted sets
//! - Pool: connection pool and collection registration
//! - Registry: logical name to model type mapping
//! - Config: `stratamodel.toml` loading
//!
//! The engine holds no locks across operations. Multi-key consistency
//! comes from the backing store running each batch as one unit.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod config;
pub mod id;
pub mod index;
pub mod pool;
pub mod range;
pub mod registry;

pub use collection::Collection;
pub use config::{ConfigError, ModelConfig, CONFIG_FILE_NAME};
pub use id::generate_id;
pub use index::IndexMaintainer;
pub use pool::{CollectionOptions, Pool};
pub use range::FieldRange;
pub use registry::Registry;
