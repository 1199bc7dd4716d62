//! The `Model` trait
//!
//! A record type implements `Model` to describe its fields and expose its
//! identifier. The field list is consumed once by the schema compiler.

use crate::schema::FieldSet;

/// A record type that can be registered as a collection
///
/// ```ignore
/// #[derive(Default)]
/// struct Person {
///     id: String,
///     name: String,
///     age: u32,
/// }
///
/// impl Model for Person {
///     fn declare(fields: &mut FieldSet<Self>) {
///         fields.scalar("Name", |p| &p.name, |p| &mut p.name).index();
///         fields.scalar("Age", |p| &p.age, |p| &mut p.age).index();
///     }
///
///     fn model_id(&self) -> &str {
///         &self.id
///     }
///
///     fn set_model_id(&mut self, id: String) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Model: Default + Send + Sync + 'static {
    /// Default logical collection name: the type name without its path
    fn model_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Declare persisted fields in order
    fn declare(fields: &mut FieldSet<Self>);

    /// The record identifier; empty when not yet assigned
    fn model_id(&self) -> &str;

    /// Assign the record identifier
    fn set_model_id(&mut self, id: String);
}
