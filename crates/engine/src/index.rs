//! Index Maintainer
//!
//! Computes the index mutations that accompany a primary-record write or
//! delete. The collection places them in the same atomic batch as the hash
//! write, in this order:
//!
//! 1. for every touched string-indexed field, `remove_string_index_entry`,
//!    which reads the value still stored in the hash and removes its
//!    `{value}\0{id}` member
//! 2. the hash write itself
//! 3. one `ZADD` per indexed field carrying the new value
//!
//! Numeric and boolean indexes need no step 1: the member is the id alone,
//! so `ZADD` with the new score replaces the old entry.
//!
//! ## Entry Encodings
//!
//! | Kind | Member | Score |
//! |---|---|---|
//! | Numeric | id | the value |
//! | Boolean | id | 0 or 1 |
//! | String | `{value}\0{id}` | 0 |
//!
//! String entries share score 0 so `ZRANGEBYLEX` orders them by member
//! bytes, i.e. by value and then id.

use strata_model_core::field::{FieldSpec, IndexKind};
use strata_model_core::key::{self, STRING_INDEX_SEPARATOR};
use strata_model_core::{ModelError, ModelResult, Schema};
use strata_model_storage::{Command, Script};

/// Score shared by every string index entry
pub const STRING_INDEX_SCORE: f64 = 0.0;

/// Index mutations for one record of one collection
#[derive(Debug, Clone, Copy)]
pub struct IndexMaintainer<'a> {
    collection: &'a str,
    id: &'a str,
}

impl<'a> IndexMaintainer<'a> {
    /// Maintainer for record `id` of `collection`
    pub fn new(collection: &'a str, id: &'a str) -> Self {
        Self { collection, id }
    }

    /// Command removing the stale entry before the field is overwritten
    ///
    /// Only string indexes need one.
    pub fn stale_entry_removal(&self, field: &FieldSpec) -> Option<Command> {
        match field.index_kind {
            IndexKind::String => Some(Command::eval(
                Script::RemoveStringIndexEntry,
                vec![
                    key::record_key(self.collection, self.id),
                    key::index_key(self.collection, &field.store_name),
                ],
                vec![
                    self.id.as_bytes().to_vec(),
                    field.store_name.as_bytes().to_vec(),
                ],
            )),
            _ => None,
        }
    }

    /// Command adding the entry for a newly written value
    ///
    /// # Errors
    ///
    /// `ModelError::InvalidValue` when the value cannot be indexed: a string
    /// containing NUL, or a numeric value that is not a number.
    pub fn entry_insertion(&self, field: &FieldSpec, encoded: &[u8]) -> ModelResult<Option<Command>> {
        let (score, member) = match field.index_kind {
            IndexKind::None => return Ok(None),
            IndexKind::Numeric | IndexKind::Boolean => {
                (index_score(field, encoded)?, self.id.as_bytes().to_vec())
            }
            IndexKind::String => (STRING_INDEX_SCORE, string_entry(field, encoded, self.id)?),
        };
        Ok(Some(Command::ZAdd {
            key: key::index_key(self.collection, &field.store_name),
            entries: vec![(score, member)],
        }))
    }

    /// Commands removing every index entry of the record
    ///
    /// Must run before the hash is deleted.
    pub fn all_entries_removal(&self, schema: &Schema) -> Vec<Command> {
        schema
            .indexed_fields()
            .map(|(_, field)| match field.index_kind {
                IndexKind::String => self.stale_entry_removal(field),
                _ => Some(Command::ZRem {
                    key: key::index_key(self.collection, &field.store_name),
                    members: vec![self.id.as_bytes().to_vec()],
                }),
            })
            .flatten()
            .collect()
    }
}

/// Score of a numeric or boolean index entry from the field's encoded text
pub fn index_score(field: &FieldSpec, encoded: &[u8]) -> ModelResult<f64> {
    let invalid = |reason: &str| ModelError::InvalidValue {
        field: field.name.clone(),
        reason: reason.to_string(),
    };
    let text = std::str::from_utf8(encoded).map_err(|_| invalid("not valid UTF-8"))?;
    match field.index_kind {
        IndexKind::Boolean => match text {
            "true" | "1" => Ok(1.0),
            "false" | "0" => Ok(0.0),
            _ => Err(invalid("not a boolean")),
        },
        _ => {
            let score: f64 = text.parse().map_err(|_| invalid("not a number"))?;
            if score.is_nan() {
                return Err(invalid("NaN cannot be indexed"));
            }
            Ok(score)
        }
    }
}

/// Member of a string index entry: `{value}\0{id}`
pub fn string_entry(field: &FieldSpec, encoded: &[u8], id: &str) -> ModelResult<Vec<u8>> {
    if encoded.contains(&STRING_INDEX_SEPARATOR) {
        return Err(ModelError::InvalidValue {
            field: field.name.clone(),
            reason: "indexed strings cannot contain NUL".to_string(),
        });
    }
    Ok(key::string_index_member(encoded, id))
}

/// `ARGV` of `bulk_delete_by_set` for a collection: its name followed by
/// `s:{field}` or `n:{field}` for every indexed field
pub fn bulk_delete_args(collection: &str, schema: &Schema) -> Vec<Vec<u8>> {
    std::iter::once(collection.as_bytes().to_vec())
        .chain(schema.indexed_fields().map(|(_, field)| {
            let tag = match field.index_kind {
                IndexKind::String => "s",
                _ => "n",
            };
            format!("{tag}:{}", field.store_name).into_bytes()
        }))
        .collect()
}
