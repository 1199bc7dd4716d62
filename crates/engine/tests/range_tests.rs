//! Integration tests for range queries over field indexes

mod common;

use common::*;
use std::ops::Bound;
use strata_model_core::ModelError;
use strata_model_engine::{Collection, FieldRange, Pool};
use strata_model_storage::{Command, MemoryBackend, Reply};

fn seeded() -> (Pool, MemoryBackend, Collection<Person>) {
    let (pool, backend) = memory_pool();
    let people = pool.new_collection::<Person>().unwrap();
    for (id, name, age, active) in [
        ("p1", "ann", 10, true),
        ("p2", "anna", 20, false),
        ("p3", "bob", 30, true),
        ("p4", "carl", 25, false),
    ] {
        people.save(&mut person(id, name, age, active)).unwrap();
    }
    (pool, backend, people)
}

#[test]
fn test_lex_range_returns_both_values() {
    let (pool, _) = memory_pool();
    let labels = pool.new_collection::<Labelled>().unwrap();
    for (id, value) in [("x", "a"), ("y", "b"), ("z", "c")] {
        let mut label = Labelled {
            id: id.to_string(),
            string: value.to_string(),
        };
        labels.save(&mut label).unwrap();
    }

    let mut ids = labels
        .ids_in_range("String", &FieldRange::text("a"..="b"))
        .unwrap();
    ids.sort();
    assert_eq!(ids, vec!["x", "y"]);
}

#[test]
fn test_lex_bounds_respect_value_boundaries() {
    let (_, _, people) = seeded();

    let exact = people
        .ids_in_range("Name", &FieldRange::text("ann"..="ann"))
        .unwrap();
    assert_eq!(exact, vec!["p1"]);

    let half_open = people
        .ids_in_range("Name", &FieldRange::text("ann".."bob"))
        .unwrap();
    assert_eq!(half_open, vec!["p1", "p2"]);

    let after = FieldRange::Lex {
        min: Bound::Excluded("ann".to_string()),
        max: Bound::Unbounded,
    };
    assert_eq!(
        people.ids_in_range("Name", &after).unwrap(),
        vec!["p2", "p3", "p4"]
    );

    assert_eq!(
        people.ids_in_range("Name", &FieldRange::all_text()).unwrap(),
        vec!["p1", "p2", "p3", "p4"]
    );
}

#[test]
fn test_numeric_range_ordered_by_score() {
    let (_, _, people) = seeded();

    assert_eq!(
        people
            .ids_in_range("Age", &FieldRange::numeric(15.0..))
            .unwrap(),
        vec!["p2", "p4", "p3"]
    );
    assert_eq!(
        people
            .ids_in_range("Age", &FieldRange::numeric(10.0..25.0))
            .unwrap(),
        vec!["p1", "p2"]
    );
    assert!(people
        .ids_in_range("Age", &FieldRange::numeric(100.0..))
        .unwrap()
        .is_empty());
}

#[test]
fn test_boolean_range() {
    let (_, _, people) = seeded();
    let mut active = people
        .ids_in_range("Active", &FieldRange::boolean(true))
        .unwrap();
    active.sort();
    assert_eq!(active, vec!["p1", "p3"]);
}

#[test]
fn test_range_reflects_updates_and_deletes() {
    let (_, _, people) = seeded();
    let mut bob = people.find("p3").unwrap();
    bob.age = 5;
    people.save(&mut bob).unwrap();
    people.delete("p4").unwrap();

    assert_eq!(
        people
            .ids_in_range("Age", &FieldRange::numeric(..=20.0))
            .unwrap(),
        vec!["p3", "p1", "p2"]
    );
    assert!(people
        .ids_in_range("Name", &FieldRange::text("carl"..="carl"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_temporary_key_removed() {
    let (_, backend, people) = seeded();
    let before = backend.keys();
    people
        .ids_in_range("Age", &FieldRange::numeric(..))
        .unwrap();
    assert_eq!(backend.keys(), before);
}

#[test]
fn test_find_in_range_loads_records() {
    let (_, _, people) = seeded();
    let found = people
        .find_in_range("Age", &FieldRange::numeric(20.0..=30.0))
        .unwrap();
    let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["anna", "carl", "bob"]);
    assert_eq!(found[0], person("p2", "anna", 20, false));
}

#[test]
fn test_range_errors() {
    let (_, _, people) = seeded();

    assert!(matches!(
        people.ids_in_range("Height", &FieldRange::numeric(..)),
        Err(ModelError::UnknownField { .. })
    ));
    assert!(matches!(
        people.ids_in_range("Note", &FieldRange::all_text()),
        Err(ModelError::InvalidOperation(_))
    ));
    assert!(matches!(
        people.ids_in_range("Name", &FieldRange::numeric(..)),
        Err(ModelError::InvalidOperation(_))
    ));
    assert!(matches!(
        people.ids_in_range("Age", &FieldRange::text("a"..)),
        Err(ModelError::InvalidOperation(_))
    ));
    assert!(matches!(
        people.ids_in_range("Name", &FieldRange::text("a\0"..)),
        Err(ModelError::InvalidValue { .. })
    ));
}

#[test]
fn test_extract_into_is_chainable() {
    let (pool, _, people) = seeded();

    let ids = people
        .extract_into("Age", &FieldRange::numeric(20.0..), "Person:older")
        .unwrap();
    assert_eq!(ids, vec!["p2", "p4", "p3"]);

    let scores: Vec<Option<f64>> = ["p2", "p4", "p3"]
        .iter()
        .map(|id| {
            raw(
                &pool,
                Command::ZScore {
                    key: "Person:older".to_string(),
                    member: id.as_bytes().to_vec(),
                },
            )
            .into_score()
            .unwrap()
        })
        .collect();
    assert_eq!(scores, vec![Some(1.0), Some(2.0), Some(3.0)]);

    assert_eq!(people.delete_set("Person:older").unwrap(), 3);
    assert_eq!(people.count().unwrap(), 1);
    assert_eq!(people.find("p1").unwrap().name, "ann");
    assert!(people.find("p3").unwrap_err().is_not_found());
    assert_eq!(
        zmembers(&pool, "Person:Name"),
        vec![string_member("ann", "p1")]
    );
}

#[test]
fn test_delete_set_from_plain_set() {
    let (pool, _, people) = seeded();
    raw(
        &pool,
        Command::SAdd {
            key: "doomed".to_string(),
            members: vec![b"p1".to_vec(), b"p2".to_vec(), b"ghost".to_vec()],
        },
    );

    assert_eq!(people.delete_set("doomed").unwrap(), 2);
    assert_eq!(people.count().unwrap(), 2);
    let card = raw(
        &pool,
        Command::SCard {
            key: "doomed".to_string(),
        },
    );
    assert_eq!(card, Reply::Int(3));
}
