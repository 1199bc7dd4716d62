//! Server-side script catalogue
//!
//! Each script runs as one indivisible unit on the backing store. The Lua
//! source is embedded at build time; [`crate::MemoryBackend`] carries Rust
//! equivalents with the same argument layout and return values.

use std::fmt;

/// A catalogued server-side script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    /// `KEYS = [set]`, `ARGV = [collection, "s:field" | "n:field" ...]`
    ///
    /// Deletes every record whose id is in the set (or sorted set), its
    /// entries in the listed indexes and its membership. Returns the number
    /// of records that existed.
    BulkDeleteBySet,

    /// `KEYS = [record, index]`, `ARGV = [id, field]`
    ///
    /// Removes the string index member for the field's current value.
    RemoveStringIndexEntry,

    /// `KEYS = [index, dest]`, `ARGV = [min, max]`
    ///
    /// Copies ids with score in range into `dest` with scores `1..N`.
    ExtractScoreRange,

    /// `KEYS = [index, dest]`, `ARGV = [min, max]`
    ///
    /// Copies ids parsed from members in lex range into `dest` with scores
    /// `1..N`.
    ExtractLexRange,
}

impl Script {
    /// Every catalogued script
    pub const ALL: [Script; 4] = [
        Script::BulkDeleteBySet,
        Script::RemoveStringIndexEntry,
        Script::ExtractScoreRange,
        Script::ExtractLexRange,
    ];

    /// Script name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Script::BulkDeleteBySet => "bulk_delete_by_set",
            Script::RemoveStringIndexEntry => "remove_string_index_entry",
            Script::ExtractScoreRange => "extract_score_range",
            Script::ExtractLexRange => "extract_lex_range",
        }
    }

    /// Lua source
    pub fn source(&self) -> &'static str {
        match self {
            Script::BulkDeleteBySet => include_str!("bulk_delete_by_set.lua"),
            Script::RemoveStringIndexEntry => include_str!("remove_string_index_entry.lua"),
            Script::ExtractScoreRange => include_str!("extract_score_range.lua"),
            Script::ExtractLexRange => include_str!("extract_lex_range.lua"),
        }
    }

    /// Number of `KEYS` the script takes
    pub fn num_keys(&self) -> usize {
        match self {
            Script::BulkDeleteBySet => 1,
            Script::RemoveStringIndexEntry
            | Script::ExtractScoreRange
            | Script::ExtractLexRange => 2,
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
