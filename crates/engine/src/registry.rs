//! Collection registry
//!
//! Maps model types to logical collection names. A name can be taken by one
//! type only, and a type can be registered under one name only, so two
//! collections never share keys.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use strata_model_core::{Schema, SchemaError};

/// Registered collections of one pool
#[derive(Debug, Default)]
pub struct Registry {
    by_name: HashMap<String, Arc<Schema>>,
    by_type: HashMap<TypeId, String>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled schema under its logical name
    ///
    /// # Errors
    ///
    /// - `SchemaError::DuplicateName` if the name is taken
    /// - `SchemaError::DuplicateType` if the type is already registered
    pub fn register(&mut self, schema: Arc<Schema>) -> Result<(), SchemaError> {
        if self.by_name.contains_key(schema.name()) {
            return Err(SchemaError::DuplicateName {
                name: schema.name().to_string(),
            });
        }
        if let Some(name) = self.by_type.get(&schema.type_id()) {
            return Err(SchemaError::DuplicateType {
                type_name: schema.type_name().to_string(),
                name: name.clone(),
            });
        }
        self.by_type.insert(schema.type_id(), schema.name().to_string());
        self.by_name.insert(schema.name().to_string(), schema);
        Ok(())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_model_core::{compile, FieldSet, Model};

    #[derive(Default)]
    struct Person {
        id: String,
        name: String,
    }

    impl Model for Person {
        fn declare(fields: &mut FieldSet<Self>) {
            fields.scalar("Name", |p: &Self| &p.name, |p: &mut Self| &mut p.name);
        }

        fn model_id(&self) -> &str {
            &self.id
        }

        fn set_model_id(&mut self, id: String) {
            self.id = id;
        }
    }

    #[derive(Default)]
    struct Robot {
        id: String,
    }

    impl Model for Robot {
        fn model_name() -> &'static str {
            "Person"
        }

        fn declare(_fields: &mut FieldSet<Self>) {}

        fn model_id(&self) -> &str {
            &self.id
        }

        fn set_model_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn schema<M: Model>() -> Arc<Schema> {
        Arc::clone(compile::<M>().unwrap().schema())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry.register(schema::<Person>()).unwrap();
        assert_eq!(registry.by_name.len(), 1);
        assert_eq!(
            registry.by_type.get(&TypeId::of::<Person>()).map(String::as_str),
            Some("Person")
        );
        assert_eq!(registry.by_name["Person"].len(), 1);
        assert_eq!(registry.names(), vec!["Person".to_string()]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = Registry::new();
        registry.register(schema::<Person>()).unwrap();
        let err = registry.register(schema::<Robot>()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateName {
                name: "Person".to_string()
            }
        );
        assert!(!registry.by_type.contains_key(&TypeId::of::<Robot>()));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut registry = Registry::new();
        registry.register(schema::<Person>()).unwrap();
        let renamed = Arc::new(schema::<Person>().with_name("People"));
        assert!(matches!(
            registry.register(renamed),
            Err(SchemaError::DuplicateType { ref name, .. }) if name == "Person"
        ));
        assert!(!registry.by_name.contains_key("People"));
    }
}
