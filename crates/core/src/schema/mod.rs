//! Compiled schemas
//!
//! A [`Schema`] is the immutable, compiled description of a model type's
//! persisted shape: an ordered field list, a name lookup and the fallback
//! codec. A [`ModelSpec`] pairs a schema with the typed accessors that move
//! values in and out of model instances.
//!
//! Schemas are compiled once per model type (see [`compiler`]) and shared
//! behind `Arc`. Registration options (logical name, fallback codec) produce
//! a renamed copy; the field table is never recompiled.

pub mod compiler;
pub mod fields;

pub use compiler::{compile, SchemaCache};
pub use fields::{FieldAccessor, FieldSet};

use crate::codec::Fallback;
use crate::error::ModelResult;
use crate::field::FieldSpec;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Compiled, immutable description of a model type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
    fields: Vec<FieldSpec>,
    fields_by_name: HashMap<String, usize>,
    fallback: Fallback,
}

impl Schema {
    pub(crate) fn new(
        type_id: TypeId,
        type_name: &'static str,
        name: String,
        fields: Vec<FieldSpec>,
    ) -> Self {
        let fields_by_name = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();
        Self {
            type_id,
            type_name,
            name,
            fields,
            fields_by_name,
            fallback: Fallback::default(),
        }
    }

    /// Identity of the compiled Rust type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the compiled type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Logical collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field by declared name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields_by_name.get(name).map(|idx| &self.fields[*idx])
    }

    /// Position of a field by declared name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields_by_name.get(name).copied()
    }

    /// Fallback codec for `Inconvertible` fields
    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    /// Fields that carry an index, with their positions
    pub fn indexed_fields(&self) -> impl Iterator<Item = (usize, &FieldSpec)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_indexed())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy with a different logical name
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy with a different fallback codec
    pub fn with_fallback(&self, fallback: Fallback) -> Self {
        Self {
            fallback,
            ..self.clone()
        }
    }
}

/// A schema together with typed accessors for `M`
///
/// `accessors[i]` reads and writes `schema.fields()[i]`.
pub struct ModelSpec<M> {
    schema: Arc<Schema>,
    accessors: Arc<[FieldAccessor<M>]>,
}

impl<M> Clone for ModelSpec<M> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            accessors: Arc::clone(&self.accessors),
        }
    }
}

impl<M> fmt::Debug for ModelSpec<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<M> ModelSpec<M> {
    pub(crate) fn new(schema: Schema, accessors: Vec<FieldAccessor<M>>) -> Self {
        Self {
            schema: Arc::new(schema),
            accessors: Arc::from(accessors),
        }
    }

    /// The compiled schema
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Apply registration options, sharing the accessor table
    pub fn with_options(&self, name: Option<&str>, fallback: Fallback) -> Self {
        let schema = match name {
            Some(name) => self.schema.with_name(name),
            None => (*self.schema).clone(),
        };
        Self {
            schema: Arc::new(schema.with_fallback(fallback)),
            accessors: Arc::clone(&self.accessors),
        }
    }

    /// Encode field `idx` of `model`; `None` means the hash field is absent
    pub fn encode_field(&self, idx: usize, model: &M) -> ModelResult<Option<Vec<u8>>> {
        self.accessors[idx].encode(model, self.schema.fallback())
    }

    /// Decode a present hash value into field `idx` of `model`
    pub fn decode_field(&self, idx: usize, model: &mut M, raw: &[u8]) -> ModelResult<()> {
        self.accessors[idx].decode(model, raw, self.schema.fallback())
    }
}
