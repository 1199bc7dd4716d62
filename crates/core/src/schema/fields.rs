//! Field declarations
//!
//! A [`crate::Model`] lists its fields into a [`FieldSet`]. Each method
//! records the declared shape of the field together with typed accessors,
//! and returns the [`FieldDecl`] so annotations can be chained:
//!
//! ```ignore
//! fn declare(fields: &mut FieldSet<Self>) {
//!     fields.scalar("Age", |p| &p.age, |p| &mut p.age).index();
//!     fields.scalar("Name", |p| &p.name, |p| &mut p.name).store_as("name");
//!     fields.optional("Nickname", |p| &p.nickname, |p| &mut p.nickname);
//!     fields.fallback("Tags", |p| &p.tags, |p| &mut p.tags);
//!     fields.scalar("cache", |p| &p.cache, |p| &mut p.cache).private();
//! }
//! ```

use crate::codec::{self, Fallback, Scalar};
use crate::error::ModelResult;
use crate::field::{FieldDecl, TypeShape};
use serde::de::DeserializeOwned;
use serde::Serialize;

type EncodeFn<M> = dyn Fn(&M, &Fallback) -> ModelResult<Option<Vec<u8>>> + Send + Sync;
type DecodeFn<M> = dyn Fn(&mut M, &[u8], &Fallback) -> ModelResult<()> + Send + Sync;

/// Typed read/write access to one field of `M`
pub struct FieldAccessor<M> {
    encode: Box<EncodeFn<M>>,
    decode: Box<DecodeFn<M>>,
}

impl<M> FieldAccessor<M> {
    /// Encode the field; `None` means the hash field is absent
    pub fn encode(&self, model: &M, fallback: &Fallback) -> ModelResult<Option<Vec<u8>>> {
        (self.encode)(model, fallback)
    }

    /// Decode a present hash field into the model
    pub fn decode(&self, model: &mut M, raw: &[u8], fallback: &Fallback) -> ModelResult<()> {
        (self.decode)(model, raw, fallback)
    }
}

/// Ordered field declarations of a model type
pub struct FieldSet<M> {
    entries: Vec<(FieldDecl, FieldAccessor<M>)>,
}

impl<M: 'static> Default for FieldSet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> FieldSet<M> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of declarations, including ones the classifier will exclude
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared fields in declaration order
    pub fn decls(&self) -> impl Iterator<Item = &FieldDecl> {
        self.entries.iter().map(|(decl, _)| decl)
    }

    pub(crate) fn into_entries(self) -> Vec<(FieldDecl, FieldAccessor<M>)> {
        self.entries
    }

    /// Declare a scalar field
    pub fn scalar<T: Scalar>(
        &mut self,
        name: &str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> &mut FieldDecl {
        let field = name.to_string();
        let accessor = FieldAccessor {
            encode: Box::new(move |model: &M, _fallback: &Fallback| {
                Ok(Some(codec::encode_primitive(get(model))))
            }),
            decode: Box::new(move |model: &mut M, raw: &[u8], _fallback: &Fallback| {
                *get_mut(model) = codec::decode_primitive(&field, raw)?;
                Ok(())
            }),
        };
        let decl = FieldDecl::new(name, T::TYPE_NAME, TypeShape::Scalar(T::VALUE_TYPE));
        self.push(decl, accessor)
    }

    /// Declare an optional scalar field
    pub fn optional<T: Scalar>(
        &mut self,
        name: &str,
        get: fn(&M) -> &Option<T>,
        get_mut: fn(&mut M) -> &mut Option<T>,
    ) -> &mut FieldDecl {
        let field = name.to_string();
        let accessor = FieldAccessor {
            encode: Box::new(move |model: &M, _fallback: &Fallback| {
                Ok(codec::encode_pointer(get(model)))
            }),
            decode: Box::new(move |model: &mut M, raw: &[u8], _fallback: &Fallback| {
                *get_mut(model) = codec::decode_pointer(&field, raw)?;
                Ok(())
            }),
        };
        let decl = FieldDecl::new(
            name,
            std::any::type_name::<Option<T>>(),
            TypeShape::Optional(T::VALUE_TYPE),
        );
        self.push(decl, accessor)
    }

    /// Declare a field stored through the fallback codec
    pub fn fallback<T>(
        &mut self,
        name: &str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> &mut FieldDecl
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let accessor = Self::serialized(name, get, get_mut);
        let decl = FieldDecl::new(name, std::any::type_name::<T>(), TypeShape::Opaque);
        self.push(decl, accessor)
    }

    /// Declare a named struct-valued field, stored through the fallback codec
    pub fn aggregate<T>(
        &mut self,
        name: &str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> &mut FieldDecl
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let accessor = Self::serialized(name, get, get_mut);
        let decl = FieldDecl::new(name, std::any::type_name::<T>(), TypeShape::Aggregate);
        self.push(decl, accessor)
    }

    /// Declare an anonymously embedded struct, named after its type
    ///
    /// The aggregate is kept whole as one `Inconvertible` field; it is not
    /// flattened into its sub-fields.
    pub fn embedded<T>(
        &mut self,
        name: &str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> &mut FieldDecl
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let accessor = Self::serialized(name, get, get_mut);
        let mut decl = FieldDecl::new(name, std::any::type_name::<T>(), TypeShape::Aggregate);
        decl.embedded = true;
        self.push(decl, accessor)
    }

    /// Declare an anonymously embedded optional struct, named after its type
    ///
    /// `None` leaves the hash field absent.
    pub fn embedded_optional<T>(
        &mut self,
        name: &str,
        get: fn(&M) -> &Option<T>,
        get_mut: fn(&mut M) -> &mut Option<T>,
    ) -> &mut FieldDecl
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let encode_field = name.to_string();
        let decode_field = name.to_string();
        let accessor = FieldAccessor {
            encode: Box::new(move |model: &M, fallback: &Fallback| {
                get(model)
                    .as_ref()
                    .map(|value| codec::encode_inconvertible(fallback, &encode_field, value))
                    .transpose()
            }),
            decode: Box::new(move |model: &mut M, raw: &[u8], fallback: &Fallback| {
                *get_mut(model) = Some(codec::decode_inconvertible(fallback, &decode_field, raw)?);
                Ok(())
            }),
        };
        let mut decl = FieldDecl::new(
            name,
            std::any::type_name::<Option<T>>(),
            TypeShape::Aggregate,
        );
        decl.embedded = true;
        self.push(decl, accessor)
    }

    fn serialized<T>(
        name: &str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> FieldAccessor<M>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let encode_field = name.to_string();
        let decode_field = name.to_string();
        FieldAccessor {
            encode: Box::new(move |model: &M, fallback: &Fallback| {
                codec::encode_inconvertible(fallback, &encode_field, get(model)).map(Some)
            }),
            decode: Box::new(move |model: &mut M, raw: &[u8], fallback: &Fallback| {
                *get_mut(model) = codec::decode_inconvertible(fallback, &decode_field, raw)?;
                Ok(())
            }),
        }
    }

    fn push(&mut self, decl: FieldDecl, accessor: FieldAccessor<M>) -> &mut FieldDecl {
        let idx = self.entries.len();
        self.entries.push((decl, accessor));
        &mut self.entries[idx].0
    }
}
