//! Field classifier
//!
//! `classify` is a pure function of a field's declared name, type and
//! annotations. Rules are evaluated in order:
//!
//! 1. not-public name: excluded
//! 2. ignored: excluded
//! 3. embedded aggregate: `Inconvertible`, stored under the aggregate's type name
//! 4. representable scalar: `Primitive`
//! 5. optional representable scalar: `Pointer`
//! 6. anything else: `Inconvertible`
//!
//! The index annotation is validated against the resolved kind and type.
//! Only `Primitive` fields of numeric, boolean or text type can be indexed.

use crate::error::SchemaError;
use crate::field::{FieldDecl, FieldKind, FieldSpec, IndexKind, TypeShape, ValueType, Visibility};

/// Result of classifying one declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The field is not part of the schema
    Excluded,
    /// The field is included with this spec
    Included(FieldSpec),
}

/// Classify one declared field
///
/// # Errors
///
/// `SchemaError::UnsupportedIndex` when an index is requested on a field
/// that is not a numeric, boolean or text `Primitive`.
pub fn classify(decl: &FieldDecl) -> Result<Classification, SchemaError> {
    if decl.visibility == Visibility::Private || decl.ignored {
        return Ok(Classification::Excluded);
    }

    let (kind, value_type) = match (decl.embedded, decl.shape) {
        (true, _) => (FieldKind::Inconvertible, ValueType::Opaque),
        (false, TypeShape::Scalar(vt)) if vt != ValueType::Opaque => (FieldKind::Primitive, vt),
        (false, TypeShape::Optional(vt)) if vt != ValueType::Opaque => (FieldKind::Pointer, vt),
        (false, _) => (FieldKind::Inconvertible, ValueType::Opaque),
    };

    let index_kind = if decl.indexed {
        match (kind, value_type.index_kind()) {
            (FieldKind::Primitive, Some(index_kind)) => index_kind,
            _ => {
                return Err(SchemaError::UnsupportedIndex {
                    field: decl.name.clone(),
                    type_name: decl.type_name.to_string(),
                })
            }
        }
    } else {
        IndexKind::None
    };

    Ok(Classification::Included(FieldSpec {
        name: decl.name.clone(),
        store_name: decl.store_name.clone().unwrap_or_else(|| decl.name.clone()),
        kind,
        value_type,
        type_name: decl.type_name.to_string(),
        index_kind,
    }))
}
