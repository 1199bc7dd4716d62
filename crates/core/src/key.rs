//! Key layout and identifier validation
//!
//! This module fixes the backing-store key layout. It must stay bit-exact
//! for interoperability with data persisted by earlier versions:
//!
//! | Purpose | Key | Value type |
//! |---|---|---|
//! | Primary record | `{collection}:{id}` | hash of `storeName -> encoded text` |
//! | Membership set | `{collection}:all` | set of identifiers |
//! | Numeric/Boolean index | `{collection}:{storeName}` | sorted set, member = id |
//! | String index | `{collection}:{storeName}` | sorted set, member = `{value}\0{id}` |
//!
//! ## Identifier Rules
//!
//! - Identifiers must not be empty once assigned
//! - Identifiers must not contain NUL bytes (the string index separator)
//! - Identifiers must not be `all` (it would alias the membership set)
//! - Identifiers must not exceed [`MAX_ID_BYTES`]

use thiserror::Error;

/// Separator between collection name and the key suffix
pub const KEY_SEPARATOR: char = ':';

/// Suffix of the membership set key
pub const MEMBERS_SUFFIX: &str = "all";

/// Separator between value and identifier in string index members
pub const STRING_INDEX_SEPARATOR: u8 = 0;

/// Maximum identifier length in bytes
pub const MAX_ID_BYTES: usize = 1024;

/// Key of the primary record hash: `{collection}:{id}`
pub fn record_key(collection: &str, id: &str) -> String {
    format!("{collection}{KEY_SEPARATOR}{id}")
}

/// Key of the membership set: `{collection}:all`
pub fn members_key(collection: &str) -> String {
    format!("{collection}{KEY_SEPARATOR}{MEMBERS_SUFFIX}")
}

/// Key of a field index sorted set: `{collection}:{storeName}`
pub fn index_key(collection: &str, store_name: &str) -> String {
    format!("{collection}{KEY_SEPARATOR}{store_name}")
}

/// Build a string index member: `{value}\0{id}`
pub fn string_index_member(value: &[u8], id: &str) -> Vec<u8> {
    let mut member = Vec::with_capacity(value.len() + 1 + id.len());
    member.extend_from_slice(value);
    member.push(STRING_INDEX_SEPARATOR);
    member.extend_from_slice(id.as_bytes());
    member
}

/// Recover the identifier from a string index member
///
/// The identifier is everything after the last NUL. Returns `None` when the
/// member carries no separator.
pub fn id_from_string_member(member: &[u8]) -> Option<&[u8]> {
    member
        .iter()
        .rposition(|b| *b == STRING_INDEX_SEPARATOR)
        .map(|pos| &member[pos + 1..])
}

/// Validate a record identifier
///
/// Empty identifiers are rejected here; callers assign one before validating.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.as_bytes().contains(&STRING_INDEX_SEPARATOR) {
        return Err(IdError::ContainsNul);
    }
    if id == MEMBERS_SUFFIX {
        return Err(IdError::Reserved);
    }
    if id.len() > MAX_ID_BYTES {
        return Err(IdError::TooLong {
            actual: id.len(),
            max: MAX_ID_BYTES,
        });
    }
    Ok(())
}

/// Validate a collection name
///
/// Names become key prefixes, so they cannot be empty or contain the key
/// separator or NUL.
pub fn validate_collection_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("collection name cannot be empty".to_string());
    }
    if name.contains(KEY_SEPARATOR) {
        return Err(format!("collection name cannot contain '{KEY_SEPARATOR}'"));
    }
    if name.contains('\0') {
        return Err("collection name cannot contain NUL bytes".to_string());
    }
    Ok(())
}

/// Identifier validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// Identifier is empty (length 0)
    #[error("Id cannot be empty")]
    Empty,

    /// Identifier contains NUL byte (\0)
    #[error("Id cannot contain NUL bytes")]
    ContainsNul,

    /// Identifier aliases the membership set key
    #[error("Id cannot be '{}'", MEMBERS_SUFFIX)]
    Reserved,

    /// Identifier exceeds maximum length
    #[error("Id too long: {actual} bytes exceeds maximum {max}")]
    TooLong {
        /// Actual length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },
}
