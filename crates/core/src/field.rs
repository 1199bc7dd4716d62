//! Field classification types
//!
//! A model declares its fields as [`FieldDecl`]s. The classifier turns each
//! declaration into a [`FieldSpec`] (or excludes it), and the schema compiler
//! collects the specs into a [`crate::schema::Schema`].
//!
//! ## Closed Classification
//!
//! Every included field has exactly one [`FieldKind`]:
//! - `Primitive`: a scalar the store represents directly
//! - `Pointer`: an optional scalar; `None` is stored as an absent hash field
//! - `Inconvertible`: anything else, stored through the fallback codec

use serde::{Deserialize, Serialize};

/// How a field's value reaches the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Directly store-representable scalar
    Primitive,
    /// Optional wrapper over a representable scalar
    Pointer,
    /// Requires the fallback codec (aggregates and unsupported scalars)
    Inconvertible,
}

/// Which index, if any, is maintained for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexKind {
    /// No index
    #[default]
    None,
    /// Sorted set scored by the numeric value
    Numeric,
    /// Sorted set ordered by member text
    String,
    /// Sorted set scored 0/1
    Boolean,
}

impl IndexKind {
    /// Whether an index is maintained
    pub fn is_indexed(&self) -> bool {
        !matches!(self, IndexKind::None)
    }

    /// Whether the index is scored (numeric or boolean)
    pub fn is_scored(&self) -> bool {
        matches!(self, IndexKind::Numeric | IndexKind::Boolean)
    }
}

/// Semantic type of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Integers, floats and durations
    Numeric,
    /// UTF-8 text
    Text,
    /// `true` / `false`
    Boolean,
    /// No native representation
    Opaque,
}

impl ValueType {
    /// The index kind this value type supports, if any
    pub fn index_kind(&self) -> Option<IndexKind> {
        match self {
            ValueType::Numeric => Some(IndexKind::Numeric),
            ValueType::Text => Some(IndexKind::String),
            ValueType::Boolean => Some(IndexKind::Boolean),
            ValueType::Opaque => None,
        }
    }
}

/// Declared shape of a field's Rust type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// A representable scalar
    Scalar(ValueType),
    /// `Option` of a representable scalar
    Optional(ValueType),
    /// A struct value (or optional struct value)
    Aggregate,
    /// Anything else
    Opaque,
}

/// Whether a declared name is externally visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Included in the schema
    #[default]
    Public,
    /// Excluded from the schema entirely
    Private,
}

/// One declared field, before classification
///
/// Built through [`crate::schema::FieldSet`]; the chaining methods stand in
/// for per-field annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Declared name; for an embedded aggregate, its type name
    pub name: String,
    /// Rust type name, used in error messages
    pub type_name: &'static str,
    /// Declared shape
    pub shape: TypeShape,
    /// Visibility of `name`
    pub visibility: Visibility,
    /// Anonymously embedded aggregate
    pub embedded: bool,
    /// Explicitly ignored
    pub ignored: bool,
    /// Overridden on-the-wire name
    pub store_name: Option<String>,
    /// Index requested
    pub indexed: bool,
}

impl FieldDecl {
    /// Create a public, unannotated declaration
    pub fn new(name: impl Into<String>, type_name: &'static str, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            type_name,
            shape,
            visibility: Visibility::Public,
            embedded: false,
            ignored: false,
            store_name: None,
            indexed: false,
        }
    }

    /// Store the field under a different hash field name
    pub fn store_as(&mut self, store_name: impl Into<String>) -> &mut Self {
        self.store_name = Some(store_name.into());
        self
    }

    /// Request an index on this field
    pub fn index(&mut self) -> &mut Self {
        self.indexed = true;
        self
    }

    /// Exclude this field from the schema
    pub fn ignore(&mut self) -> &mut Self {
        self.ignored = true;
        self
    }

    /// Mark the declared name as not externally visible
    pub fn private(&mut self) -> &mut Self {
        self.visibility = Visibility::Private;
        self
    }
}

/// Compiled description of one included field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Declared name
    pub name: String,
    /// On-the-wire hash field name
    pub store_name: String,
    /// Field kind
    pub kind: FieldKind,
    /// Semantic value type
    pub value_type: ValueType,
    /// Rust type name
    pub type_name: String,
    /// Index maintained for this field
    pub index_kind: IndexKind,
}

impl FieldSpec {
    /// Whether this field is indexed
    pub fn is_indexed(&self) -> bool {
        self.index_kind.is_indexed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_kind_predicates() {
        assert!(!IndexKind::None.is_indexed());
        assert!(IndexKind::String.is_indexed());
        assert!(!IndexKind::String.is_scored());
        assert!(IndexKind::Numeric.is_scored());
        assert!(IndexKind::Boolean.is_scored());
    }

    #[test]
    fn test_value_type_index_kinds() {
        assert_eq!(ValueType::Numeric.index_kind(), Some(IndexKind::Numeric));
        assert_eq!(ValueType::Text.index_kind(), Some(IndexKind::String));
        assert_eq!(ValueType::Boolean.index_kind(), Some(IndexKind::Boolean));
        assert_eq!(ValueType::Opaque.index_kind(), None);
    }

    #[test]
    fn test_decl_annotations_chain() {
        let mut decl = FieldDecl::new("Int", "i64", TypeShape::Scalar(ValueType::Numeric));
        decl.store_as("myInt").index();
        assert_eq!(decl.store_name.as_deref(), Some("myInt"));
        assert!(decl.indexed);
        assert_eq!(decl.visibility, Visibility::Public);
    }
}
