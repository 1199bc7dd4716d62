//! Core types for stratamodel
//!
//! This crate defines everything that does not touch the backing store:
//! - Error: Error type hierarchy (schema, transport, model)
//! - Key: backing-store key layout and identifier validation
//! - Field: field kinds, value types and index kinds
//! - Classify: the field classifier
//! - Codec: scalar text encodings and fallback codecs
//! - Schema: compiled schemas, field declarations and the schema compiler
//! - Model: the trait a record type implements to be registered

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod codec;
pub mod error;
pub mod field;
pub mod key;
pub mod model;
pub mod schema;

pub use classify::{classify, Classification};
pub use codec::{
    get_fallback, Fallback, FallbackCodec, FallbackError, JsonCodec, MessagePackCodec, Scalar,
    ValueCodec,
};
pub use error::{ModelError, ModelResult, SchemaError, StoreError, StoreResult};
pub use field::{FieldDecl, FieldKind, FieldSpec, IndexKind, TypeShape, ValueType, Visibility};
pub use key::IdError;
pub use model::Model;
pub use schema::{compile, FieldAccessor, FieldSet, ModelSpec, Schema, SchemaCache};
