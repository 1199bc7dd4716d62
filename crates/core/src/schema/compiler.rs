//! Schema compiler
//!
//! Walks a model's declared fields once, in declaration order, classifying
//! each and collecting the included ones into a [`Schema`]. Compilation is
//! fail-fast: the first invalid index request rejects the whole type.
//!
//! Results are memoized per `TypeId` in a [`SchemaCache`]. Recompiling the
//! same type yields a structurally equal schema.

use super::{FieldSet, ModelSpec, Schema};
use crate::classify::{classify, Classification};
use crate::error::SchemaError;
use crate::key::MEMBERS_SUFFIX;
use crate::model::Model;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

static GLOBAL_CACHE: Lazy<SchemaCache> = Lazy::new(SchemaCache::new);

/// Compile the schema of `M`
///
/// # Errors
///
/// - `SchemaError::UnsupportedIndex` for the first field whose index request
///   is invalid
/// - `SchemaError::DuplicateField` when two included fields share a declared
///   or store name
/// - `SchemaError::InvalidName` when an indexed field's store name would
///   collide with the membership set key
pub fn compile<M: Model>() -> Result<ModelSpec<M>, SchemaError> {
    let model = M::model_name();
    let mut declared = FieldSet::new();
    M::declare(&mut declared);

    let mut fields = Vec::with_capacity(declared.len());
    let mut accessors = Vec::with_capacity(declared.len());
    let mut names = HashSet::new();
    let mut store_names = HashSet::new();

    for (decl, accessor) in declared.into_entries() {
        let spec = match classify(&decl)? {
            Classification::Excluded => {
                trace!(
                    target: "strata::model::schema",
                    model,
                    field = %decl.name,
                    "Field excluded"
                );
                continue;
            }
            Classification::Included(spec) => spec,
        };

        if !names.insert(spec.name.clone()) {
            return Err(SchemaError::DuplicateField {
                model: model.to_string(),
                field: spec.name,
            });
        }
        if !store_names.insert(spec.store_name.clone()) {
            return Err(SchemaError::DuplicateField {
                model: model.to_string(),
                field: spec.store_name,
            });
        }
        if spec.is_indexed() && spec.store_name == MEMBERS_SUFFIX {
            return Err(SchemaError::InvalidName {
                name: spec.store_name,
                reason: "reserved for the membership set".to_string(),
            });
        }

        fields.push(spec);
        accessors.push(accessor);
    }

    debug!(
        target: "strata::model::schema",
        model,
        fields = fields.len(),
        indexed = fields.iter().filter(|f| f.is_indexed()).count(),
        "Compiled schema"
    );

    let schema = Schema::new(TypeId::of::<M>(), type_name::<M>(), model.to_string(), fields);
    Ok(ModelSpec::new(schema, accessors))
}

/// Memoized compile results, keyed by type identity
pub struct SchemaCache {
    entries: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// The process-wide cache
    pub fn global() -> &'static SchemaCache {
        &GLOBAL_CACHE
    }

    /// Return the cached spec for `M`, compiling it on first use
    ///
    /// Failed compilations are not cached.
    pub fn get_or_compile<M: Model>(&self) -> Result<ModelSpec<M>, SchemaError> {
        let key = TypeId::of::<M>();
        if let Some(entry) = self.entries.get(&key) {
            if let Some(spec) = entry.value().downcast_ref::<ModelSpec<M>>() {
                return Ok(spec.clone());
            }
        }

        let spec = compile::<M>()?;
        let cached = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(spec.clone()))
            .value()
            .clone();
        Ok(cached
            .downcast_ref::<ModelSpec<M>>()
            .cloned()
            .unwrap_or(spec))
    }

    /// Whether `M` has been compiled into this cache
    pub fn contains<M: Model>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<M>())
    }

    /// Number of cached types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached schema
    pub fn clear(&self) {
        self.entries.clear();
    }
}
