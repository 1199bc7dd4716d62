//! Record Orchestrator
//!
//! A [`Collection`] persists records of one model type. Every operation
//! acquires a pooled connection, sends one atomic batch (plus a read for
//! the multi-record paths) and releases the connection on return.
//!
//! ## Write Batch
//!
//! `save` and `save_fields` send, in order:
//!
//! 1. `remove_string_index_entry` for each touched string-indexed field
//! 2. `HSET` of the present fields and `HDEL` of the absent ones
//! 3. `SADD {collection}:all` when the membership set is maintained
//! 4. `ZADD` for each touched indexed field
//!
//! The batch runs as one `MULTI`/`EXEC` unit, so an observer sees either
//! the old record and index entries or the new ones.
//!
//! ## Membership Set
//!
//! With the membership set enabled (the default), existence is membership:
//! a saved record with no stored fields still exists. Without it, a record
//! exists while its hash is non-empty, and `find_all`, `count` and
//! `delete_all` are unavailable.

use crate::id::{ensure_id, generate_id};
use crate::index::{bulk_delete_args, IndexMaintainer};
use crate::range::{self, FieldRange};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strata_model_core::field::FieldSpec;
use strata_model_core::key;
use strata_model_core::{Model, ModelError, ModelResult, ModelSpec, Schema};
use strata_model_storage::{Command, ConnectionPool, PooledConnection, Reply, Script};
use tracing::debug;

/// Persistence handle for one registered model type
pub struct Collection<M> {
    spec: ModelSpec<M>,
    pool: Arc<ConnectionPool>,
    index: bool,
    by_store_name: Arc<HashMap<String, usize>>,
}

impl<M> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            pool: Arc::clone(&self.pool),
            index: self.index,
            by_store_name: Arc::clone(&self.by_store_name),
        }
    }
}

impl<M> fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.spec.schema().name())
            .field("index", &self.index)
            .field("fields", &self.spec.schema().len())
            .finish()
    }
}

impl<M: Model> Collection<M> {
    pub(crate) fn new(spec: ModelSpec<M>, pool: Arc<ConnectionPool>, index: bool) -> Self {
        let by_store_name = spec
            .schema()
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.store_name.clone(), idx))
            .collect();
        Self {
            spec,
            pool,
            index,
            by_store_name: Arc::new(by_store_name),
        }
    }

    /// Logical collection name, the prefix of every key
    pub fn name(&self) -> &str {
        self.spec.schema().name()
    }

    /// The compiled schema
    pub fn schema(&self) -> &Arc<Schema> {
        self.spec.schema()
    }

    /// Whether the membership set is maintained
    pub fn is_indexed(&self) -> bool {
        self.index
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Save every field of `model`
    ///
    /// Assigns a fresh identifier first if the model has none.
    pub fn save(&self, model: &mut M) -> ModelResult<()> {
        let id = self.assign_id(model)?;
        let all: Vec<usize> = (0..self.schema().len()).collect();
        self.write(&id, model, &all)
    }

    /// Save only the named fields, leaving the others untouched in the store
    ///
    /// # Errors
    ///
    /// `ModelError::UnknownField` if a name is not a declared field; nothing
    /// is written in that case.
    pub fn save_fields(&self, names: &[&str], model: &mut M) -> ModelResult<()> {
        let indices = self.resolve(names)?;
        let id = self.assign_id(model)?;
        self.write(&id, model, &indices)
    }

    fn write(&self, id: &str, model: &M, indices: &[usize]) -> ModelResult<()> {
        let schema = self.schema();
        let collection = schema.name();
        let record = key::record_key(collection, id);
        let maintainer = IndexMaintainer::new(collection, id);

        let mut removals = Vec::new();
        let mut insertions = Vec::new();
        let mut present = Vec::new();
        let mut absent = Vec::new();
        for &idx in indices {
            let field = &schema.fields()[idx];
            match self.spec.encode_field(idx, model)? {
                Some(encoded) => {
                    if let Some(cmd) = maintainer.entry_insertion(field, &encoded)? {
                        insertions.push(cmd);
                    }
                    present.push((field.store_name.clone(), encoded));
                }
                None => absent.push(field.store_name.clone()),
            }
            removals.extend(maintainer.stale_entry_removal(field));
        }

        let mut batch = removals;
        if !present.is_empty() {
            batch.push(Command::HSet {
                key: record.clone(),
                fields: present,
            });
        }
        if !absent.is_empty() {
            batch.push(Command::HDel {
                key: record,
                fields: absent,
            });
        }
        if self.index {
            batch.push(Command::SAdd {
                key: key::members_key(collection),
                members: vec![id.as_bytes().to_vec()],
            });
        }
        let index_updates = insertions.len();
        batch.extend(insertions);

        self.pool.acquire()?.execute_atomic(&batch)?;
        debug!(
            target: "strata::model::collection",
            collection,
            id,
            fields = indices.len(),
            index_updates,
            "Saved record"
        );
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Load the record with identifier `id`
    ///
    /// # Errors
    ///
    /// - `ModelError::NotFound` if no such record exists
    /// - `ModelError::Conversion` if a stored value does not parse
    pub fn find(&self, id: &str) -> ModelResult<M> {
        self.check_id(id)?;
        let replies = self
            .pool
            .acquire()?
            .execute_atomic(&self.load_batch(id, None))?;
        self.decode_loaded(id, replies, None)?
            .ok_or_else(|| self.not_found(id))
    }

    /// Load only the named fields; the rest keep their default values
    pub fn find_fields(&self, id: &str, names: &[&str]) -> ModelResult<M> {
        self.check_id(id)?;
        let indices = self.resolve(names)?;
        let replies = self
            .pool
            .acquire()?
            .execute_atomic(&self.load_batch(id, Some(&indices)))?;
        self.decode_loaded(id, replies, Some(&indices))?
            .ok_or_else(|| self.not_found(id))
    }

    /// Load every record, ordered by identifier
    ///
    /// Requires the membership set.
    pub fn find_all(&self) -> ModelResult<Vec<M>> {
        self.require_index("find_all")?;
        let mut conn = self.pool.acquire()?;
        let mut ids: Vec<String> = conn
            .execute(&Command::SMembers {
                key: key::members_key(self.name()),
            })?
            .into_bytes_array()?
            .into_iter()
            .map(|id| String::from_utf8_lossy(&id).into_owned())
            .collect();
        ids.sort();
        let models = self.load_many(&mut conn, &ids)?;
        debug!(
            target: "strata::model::collection",
            collection = self.name(),
            count = models.len(),
            "Loaded all records"
        );
        Ok(models)
    }

    /// Whether a record with identifier `id` exists
    pub fn exists(&self, id: &str) -> ModelResult<bool> {
        self.check_id(id)?;
        let mut conn = self.pool.acquire()?;
        if self.index {
            let reply = conn.execute(&Command::SIsMember {
                key: key::members_key(self.name()),
                member: id.as_bytes().to_vec(),
            })?;
            return Ok(reply.into_bool()?);
        }
        let reply = conn.execute(&Command::HGetAll {
            key: key::record_key(self.name(), id),
        })?;
        Ok(!reply.into_pairs()?.is_empty())
    }

    /// Number of records
    ///
    /// Requires the membership set.
    pub fn count(&self) -> ModelResult<usize> {
        self.require_index("count")?;
        let reply = self.pool.acquire()?.execute(&Command::SCard {
            key: key::members_key(self.name()),
        })?;
        Ok(reply.into_int()?.max(0) as usize)
    }

    // ========================================================================
    // Deletes
    // ========================================================================

    /// Delete the record with identifier `id` and all its index entries
    ///
    /// Returns whether the record existed.
    pub fn delete(&self, id: &str) -> ModelResult<bool> {
        self.check_id(id)?;
        let schema = self.schema();
        let collection = schema.name();
        let mut batch = IndexMaintainer::new(collection, id).all_entries_removal(schema);
        let del_at = batch.len();
        batch.push(Command::Del {
            keys: vec![key::record_key(collection, id)],
        });
        if self.index {
            batch.push(Command::SRem {
                key: key::members_key(collection),
                members: vec![id.as_bytes().to_vec()],
            });
        }

        let replies = self.pool.acquire()?.execute_atomic(&batch)?;
        let mut existed = false;
        for reply in replies.into_iter().skip(del_at) {
            existed |= reply.into_bool()?;
        }
        debug!(
            target: "strata::model::collection",
            collection,
            id,
            existed,
            "Deleted record"
        );
        Ok(existed)
    }

    /// Delete every record of the collection
    ///
    /// Runs as one server-side script over the membership set. Returns the
    /// number of records removed.
    pub fn delete_all(&self) -> ModelResult<usize> {
        self.require_index("delete_all")?;
        let schema = self.schema();
        let collection = schema.name();
        let mut batch = vec![Command::eval(
            Script::BulkDeleteBySet,
            vec![key::members_key(collection)],
            bulk_delete_args(collection, schema),
        )];
        let index_keys: Vec<String> = schema
            .indexed_fields()
            .map(|(_, field)| key::index_key(collection, &field.store_name))
            .collect();
        if !index_keys.is_empty() {
            batch.push(Command::Del { keys: index_keys });
        }

        let replies = self.pool.acquire()?.execute_atomic(&batch)?;
        let deleted = first_count(replies)?;
        debug!(
            target: "strata::model::collection",
            collection,
            deleted,
            "Deleted all records"
        );
        Ok(deleted)
    }

    /// Delete every record whose identifier is a member of `set_key`
    ///
    /// `set_key` may be a set or a sorted set, such as the destination of
    /// [`Collection::extract_into`]. The set itself is left in place.
    pub fn delete_set(&self, set_key: &str) -> ModelResult<usize> {
        let schema = self.schema();
        let collection = schema.name();
        let reply = self.pool.acquire()?.execute(&Command::eval(
            Script::BulkDeleteBySet,
            vec![set_key.to_string()],
            bulk_delete_args(collection, schema),
        ))?;
        let deleted = reply.into_int()?.max(0) as usize;
        debug!(
            target: "strata::model::collection",
            collection,
            set_key,
            deleted,
            "Deleted records by set"
        );
        Ok(deleted)
    }

    // ========================================================================
    // Range queries
    // ========================================================================

    /// Identifiers whose `field` falls within `range`, in index order
    ///
    /// # Errors
    ///
    /// - `ModelError::UnknownField` if `field` is not declared
    /// - `ModelError::InvalidOperation` if `field` is not indexed or the
    ///   range kind does not match its index
    pub fn ids_in_range(&self, field: &str, range: &FieldRange) -> ModelResult<Vec<String>> {
        let spec = self.indexed_field(field)?;
        let temp_key = key::index_key(self.name(), &format!("tmp:{}", generate_id()));
        let extraction = self.extraction(spec, &temp_key, range)?;
        let mut conn = self.pool.acquire()?;
        let ids = range::extract_transient(&mut conn, extraction, &temp_key)?;
        debug!(
            target: "strata::model::collection",
            collection = self.name(),
            field,
            matched = ids.len(),
            "Range query"
        );
        Ok(ids)
    }

    /// Records whose `field` falls within `range`, in index order
    ///
    /// Records deleted between the range query and the load are skipped.
    pub fn find_in_range(&self, field: &str, range: &FieldRange) -> ModelResult<Vec<M>> {
        let ids = self.ids_in_range(field, range)?;
        let mut conn = self.pool.acquire()?;
        self.load_many(&mut conn, &ids)
    }

    /// Extract the identifiers whose `field` falls within `range` into
    /// `dest_key`, scored 1..N, and return them
    ///
    /// The destination is kept so it can be chained into further queries
    /// or passed to [`Collection::delete_set`].
    pub fn extract_into(
        &self,
        field: &str,
        range: &FieldRange,
        dest_key: &str,
    ) -> ModelResult<Vec<String>> {
        let spec = self.indexed_field(field)?;
        let extraction = self.extraction(spec, dest_key, range)?;
        let mut conn = self.pool.acquire()?;
        let ids = range::extract(&mut conn, extraction, dest_key)?;
        debug!(
            target: "strata::model::collection",
            collection = self.name(),
            field,
            dest_key,
            matched = ids.len(),
            "Extracted range"
        );
        Ok(ids)
    }

    fn extraction(
        &self,
        field: &FieldSpec,
        dest_key: &str,
        range: &FieldRange,
    ) -> ModelResult<Command> {
        let index_key = key::index_key(self.name(), &field.store_name);
        range::extraction(&index_key, dest_key, field, range)
    }

    fn indexed_field(&self, name: &str) -> ModelResult<&FieldSpec> {
        let field = self
            .schema()
            .field(name)
            .ok_or_else(|| self.unknown_field(name))?;
        if !field.is_indexed() {
            return Err(ModelError::InvalidOperation(format!(
                "field {name} of collection {} is not indexed",
                self.name()
            )));
        }
        Ok(field)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn assign_id(&self, model: &mut M) -> ModelResult<String> {
        let id = ensure_id(model)?;
        self.check_id(&id)?;
        Ok(id)
    }

    /// Validate `id` for this collection
    ///
    /// Beyond the key rules, an id equal to an indexed field's store name is
    /// rejected: its record key would be that field's index key.
    fn check_id(&self, id: &str) -> ModelResult<()> {
        crate::id::check_id(id)?;
        let aliases_index = self
            .schema()
            .indexed_fields()
            .any(|(_, field)| field.store_name == id);
        if aliases_index {
            return Err(ModelError::InvalidId {
                id: id.to_string(),
                reason: "id collides with an index key of the collection".to_string(),
            });
        }
        Ok(())
    }

    fn resolve(&self, names: &[&str]) -> ModelResult<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.schema()
                    .field_index(name)
                    .ok_or_else(|| self.unknown_field(name))
            })
            .collect()
    }

    /// Commands loading one record: the membership check (if maintained),
    /// then the hash
    ///
    /// Requested fields are read with `HMGET` when membership decides
    /// existence, otherwise the whole hash is read.
    fn load_batch(&self, id: &str, requested: Option<&[usize]>) -> Vec<Command> {
        let collection = self.name();
        let record = key::record_key(collection, id);
        let mut batch = Vec::with_capacity(2);
        if self.index {
            batch.push(Command::SIsMember {
                key: key::members_key(collection),
                member: id.as_bytes().to_vec(),
            });
        }
        match requested {
            Some(indices) if self.uses_hmget(requested) => batch.push(Command::HMGet {
                key: record,
                fields: indices
                    .iter()
                    .map(|&idx| self.schema().fields()[idx].store_name.clone())
                    .collect(),
            }),
            _ => batch.push(Command::HGetAll { key: record }),
        }
        batch
    }

    fn uses_hmget(&self, requested: Option<&[usize]>) -> bool {
        self.index && matches!(requested, Some(indices) if !indices.is_empty())
    }

    /// Decode the replies of [`Self::load_batch`]; `None` if the record does
    /// not exist
    fn decode_loaded(
        &self,
        id: &str,
        mut replies: Vec<Reply>,
        requested: Option<&[usize]>,
    ) -> ModelResult<Option<M>> {
        let hash = replies.pop().unwrap_or(Reply::Nil);
        if self.index {
            let member = replies.pop().unwrap_or(Reply::Nil);
            if !member.into_bool()? {
                return Ok(None);
            }
        }

        let values: Vec<(usize, Vec<u8>)> = match requested {
            Some(indices) if self.uses_hmget(requested) => indices
                .iter()
                .copied()
                .zip(hash.into_optional_bytes_array()?)
                .filter_map(|(idx, value)| value.map(|v| (idx, v)))
                .collect(),
            _ => {
                let pairs = hash.into_pairs()?;
                if !self.index && pairs.is_empty() {
                    return Ok(None);
                }
                pairs
                    .into_iter()
                    .filter_map(|(store_name, value)| {
                        let idx = *self
                            .by_store_name
                            .get(&*String::from_utf8_lossy(&store_name))?;
                        let wanted = requested.map_or(true, |indices| indices.contains(&idx));
                        wanted.then_some((idx, value))
                    })
                    .collect()
            }
        };

        let mut model = M::default();
        model.set_model_id(id.to_string());
        for (idx, raw) in values {
            self.spec.decode_field(idx, &mut model, &raw)?;
        }
        Ok(Some(model))
    }

    fn load_many(&self, conn: &mut PooledConnection<'_>, ids: &[String]) -> ModelResult<Vec<M>> {
        let per_id = if self.index { 2 } else { 1 };
        let batch: Vec<Command> = ids
            .iter()
            .flat_map(|id| self.load_batch(id, None))
            .collect();
        let mut replies = conn.execute_atomic(&batch)?.into_iter();

        let mut models = Vec::with_capacity(ids.len());
        for id in ids {
            let chunk: Vec<Reply> = replies.by_ref().take(per_id).collect();
            if let Some(model) = self.decode_loaded(id, chunk, None)? {
                models.push(model);
            }
        }
        Ok(models)
    }

    fn require_index(&self, operation: &str) -> ModelResult<()> {
        if self.index {
            return Ok(());
        }
        Err(ModelError::InvalidOperation(format!(
            "{operation} needs the membership set, which collection {} does not maintain",
            self.name()
        )))
    }

    fn not_found(&self, id: &str) -> ModelError {
        ModelError::NotFound {
            collection: self.name().to_string(),
            id: id.to_string(),
        }
    }

    fn unknown_field(&self, field: &str) -> ModelError {
        ModelError::UnknownField {
            collection: self.name().to_string(),
            field: field.to_string(),
        }
    }
}

fn first_count(replies: Vec<Reply>) -> ModelResult<usize> {
    let first = replies.into_iter().next().unwrap_or(Reply::Int(0));
    Ok(first.into_int()?.max(0) as usize)
}
