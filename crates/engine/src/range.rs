//! Range Extractor
//!
//! Extraction copies the identifiers matching a range of one field index
//! into a destination sorted set, scored 1..N in result order. The
//! destination has the same shape as a numeric index, so it can be fed to
//! further extractions or to `bulk_delete_by_set`.
//!
//! ## Bound Syntax
//!
//! Score ranges use `ZRANGEBYSCORE` limits (`x`, `(x`, `-inf`, `+inf`).
//!
//! Lex ranges are over `{value}\0{id}` members, so value bounds are widened
//! around the separator:
//!
//! | Bound | Limit |
//! |---|---|
//! | min unbounded | `-` |
//! | min `>= v` | `[v\0` |
//! | min `> v` | `(v\x01` |
//! | max unbounded | `+` |
//! | max `<= v` | `(v\x01` |
//! | max `< v` | `(v\0` |

use std::ops::{Bound, RangeBounds};
use strata_model_core::field::{FieldSpec, IndexKind};
use strata_model_core::key::STRING_INDEX_SEPARATOR;
use strata_model_core::{ModelError, ModelResult, StoreResult};
use strata_model_storage::{format_score, Command, PooledConnection, Reply, Script};

/// A range over one indexed field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRange {
    /// Score range over a numeric or boolean index
    Score {
        /// Lower bound
        min: Bound<f64>,
        /// Upper bound
        max: Bound<f64>,
    },
    /// Value range over a string index
    Lex {
        /// Lower bound
        min: Bound<String>,
        /// Upper bound
        max: Bound<String>,
    },
}

impl FieldRange {
    /// Numeric range, e.g. `FieldRange::numeric(18.0..65.0)`
    pub fn numeric<R: RangeBounds<f64>>(range: R) -> Self {
        FieldRange::Score {
            min: range.start_bound().cloned(),
            max: range.end_bound().cloned(),
        }
    }

    /// Records whose boolean field equals `value`
    pub fn boolean(value: bool) -> Self {
        let score = if value { 1.0 } else { 0.0 };
        FieldRange::Score {
            min: Bound::Included(score),
            max: Bound::Included(score),
        }
    }

    /// String range, e.g. `FieldRange::text("a"..="b")`
    pub fn text<S, R>(range: R) -> Self
    where
        S: AsRef<str>,
        R: RangeBounds<S>,
    {
        FieldRange::Lex {
            min: owned(range.start_bound()),
            max: owned(range.end_bound()),
        }
    }

    /// Every entry of a string index
    pub fn all_text() -> Self {
        FieldRange::Lex {
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }

    /// Whether this range can be evaluated against `kind`
    pub fn applies_to(&self, kind: IndexKind) -> bool {
        match self {
            FieldRange::Score { .. } => kind.is_scored(),
            FieldRange::Lex { .. } => kind == IndexKind::String,
        }
    }

    /// `ZRANGEBYSCORE`/`ZRANGEBYLEX` limits for this range
    pub fn limits(&self, field: &FieldSpec) -> ModelResult<(Vec<u8>, Vec<u8>)> {
        match self {
            FieldRange::Score { min, max } => {
                let min = score_limit(min, "-inf", field)?;
                let max = score_limit(max, "+inf", field)?;
                Ok((min, max))
            }
            FieldRange::Lex { min, max } => {
                let min = match min {
                    Bound::Unbounded => b"-".to_vec(),
                    Bound::Included(v) => lex_limit(b'[', v, STRING_INDEX_SEPARATOR, field)?,
                    Bound::Excluded(v) => lex_limit(b'(', v, 1, field)?,
                };
                let max = match max {
                    Bound::Unbounded => b"+".to_vec(),
                    Bound::Included(v) => lex_limit(b'(', v, 1, field)?,
                    Bound::Excluded(v) => lex_limit(b'(', v, STRING_INDEX_SEPARATOR, field)?,
                };
                Ok((min, max))
            }
        }
    }

    /// The catalogued script that extracts this kind of range
    pub fn script(&self) -> Script {
        match self {
            FieldRange::Score { .. } => Script::ExtractScoreRange,
            FieldRange::Lex { .. } => Script::ExtractLexRange,
        }
    }
}

fn owned<S: AsRef<str>>(bound: Bound<&S>) -> Bound<String> {
    match bound {
        Bound::Included(v) => Bound::Included(AsRef::<str>::as_ref(v).to_string()),
        Bound::Excluded(v) => Bound::Excluded(AsRef::<str>::as_ref(v).to_string()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn score_limit(bound: &Bound<f64>, unbounded: &str, field: &FieldSpec) -> ModelResult<Vec<u8>> {
    let limit = match bound {
        Bound::Unbounded => return Ok(unbounded.as_bytes().to_vec()),
        Bound::Included(v) | Bound::Excluded(v) if v.is_nan() => {
            return Err(ModelError::InvalidValue {
                field: field.name.clone(),
                reason: "NaN range bound".to_string(),
            })
        }
        Bound::Included(v) => format_score(*v),
        Bound::Excluded(v) => format!("({}", format_score(*v)),
    };
    Ok(limit.into_bytes())
}

fn lex_limit(prefix: u8, value: &str, suffix: u8, field: &FieldSpec) -> ModelResult<Vec<u8>> {
    if value.as_bytes().contains(&STRING_INDEX_SEPARATOR) {
        return Err(ModelError::InvalidValue {
            field: field.name.clone(),
            reason: "range bounds cannot contain NUL".to_string(),
        });
    }
    let mut limit = Vec::with_capacity(value.len() + 2);
    limit.push(prefix);
    limit.extend_from_slice(value.as_bytes());
    limit.push(suffix);
    Ok(limit)
}

/// Build the extraction command for `range` over `index_key` into `dest_key`
pub fn extraction(
    index_key: &str,
    dest_key: &str,
    field: &FieldSpec,
    range: &FieldRange,
) -> ModelResult<Command> {
    if !range.applies_to(field.index_kind) {
        return Err(ModelError::InvalidOperation(format!(
            "field {} has a {:?} index, which this range cannot query",
            field.name, field.index_kind
        )));
    }
    let (min, max) = range.limits(field)?;
    Ok(Command::eval(
        range.script(),
        vec![index_key.to_string(), dest_key.to_string()],
        vec![min, max],
    ))
}

/// Run an extraction and read the destination back, keeping it
///
/// Returns the identifiers in result order.
pub fn extract(
    conn: &mut PooledConnection<'_>,
    extraction: Command,
    dest_key: &str,
) -> StoreResult<Vec<String>> {
    let replies = conn.execute_atomic(&[extraction, read_back(dest_key)])?;
    ids_from_read_back(replies)
}

/// Run an extraction into a temporary key that is removed in the same batch
pub fn extract_transient(
    conn: &mut PooledConnection<'_>,
    extraction: Command,
    temp_key: &str,
) -> StoreResult<Vec<String>> {
    let replies = conn.execute_atomic(&[
        extraction,
        read_back(temp_key),
        Command::Del {
            keys: vec![temp_key.to_string()],
        },
    ])?;
    ids_from_read_back(replies)
}

fn read_back(dest_key: &str) -> Command {
    Command::ZRange {
        key: dest_key.to_string(),
        start: 0,
        stop: -1,
    }
}

fn ids_from_read_back(replies: Vec<Reply>) -> StoreResult<Vec<String>> {
    let read_back = replies.into_iter().nth(1).unwrap_or(Reply::Nil);
    Ok(read_back
        .into_bytes_array()?
        .into_iter()
        .map(|id| String::from_utf8_lossy(&id).into_owned())
        .collect())
}
