//! Shared models and helpers for engine integration tests

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_model_core::{FieldSet, Model};
use strata_model_engine::Pool;
use strata_model_storage::{Command, MemoryBackend, Reply, DEFAULT_MAX_IDLE};

macro_rules! model_id {
    () => {
        fn model_id(&self) -> &str {
            &self.id
        }

        fn set_model_id(&mut self, id: String) {
            self.id = id;
        }
    };
}

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A pool over a fresh keyspace, plus the keyspace for inspection
pub fn memory_pool() -> (Pool, MemoryBackend) {
    init_tracing();
    let backend = MemoryBackend::new();
    let pool = Pool::new(Arc::new(backend.clone()), DEFAULT_MAX_IDLE);
    (pool, backend)
}

/// Run one raw command on the pool's backend
pub fn raw(pool: &Pool, command: Command) -> Reply {
    pool.connections()
        .acquire()
        .unwrap()
        .execute(&command)
        .unwrap()
}

/// Members of a sorted set, in order
pub fn zmembers(pool: &Pool, key: &str) -> Vec<Vec<u8>> {
    raw(
        pool,
        Command::ZRange {
            key: key.to_string(),
            start: 0,
            stop: -1,
        },
    )
    .into_bytes_array()
    .unwrap()
}

/// `{value}\0{id}`
pub fn string_member(value: &str, id: &str) -> Vec<u8> {
    let mut member = value.as_bytes().to_vec();
    member.push(0);
    member.extend_from_slice(id.as_bytes());
    member
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: u32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub active: bool,
    pub nickname: Option<String>,
    pub tags: Vec<String>,
    pub address: Address,
    pub note: String,
}

impl Model for Person {
    fn declare(fields: &mut FieldSet<Self>) {
        fields
            .scalar("Name", |p: &Self| &p.name, |p: &mut Self| &mut p.name)
            .index();
        fields
            .scalar("Age", |p: &Self| &p.age, |p: &mut Self| &mut p.age)
            .index();
        fields
            .scalar("Active", |p: &Self| &p.active, |p: &mut Self| &mut p.active)
            .index();
        fields.optional("Nickname", |p: &Self| &p.nickname, |p: &mut Self| &mut p.nickname);
        fields.fallback("Tags", |p: &Self| &p.tags, |p: &mut Self| &mut p.tags);
        fields.aggregate("Address", |p: &Self| &p.address, |p: &mut Self| &mut p.address);
        fields
            .scalar("Note", |p: &Self| &p.note, |p: &mut Self| &mut p.note)
            .store_as("note");
    }
    model_id!();
}

pub fn person(id: &str, name: &str, age: i64, active: bool) -> Person {
    Person {
        id: id.to_string(),
        name: name.to_string(),
        age,
        active,
        nickname: Some(format!("{name}-nick")),
        tags: vec!["a".to_string(), name.to_string()],
        address: Address {
            street: "Main".to_string(),
            number: age as u32,
        },
        note: format!("note for {name}"),
    }
}

/// Three unannotated primitives
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Plain {
    pub id: String,
    pub int: i64,
    pub boolean: bool,
    pub string: String,
}

impl Model for Plain {
    fn declare(fields: &mut FieldSet<Self>) {
        fields.scalar("Int", |m: &Self| &m.int, |m: &mut Self| &mut m.int);
        fields.scalar("Bool", |m: &Self| &m.boolean, |m: &mut Self| &mut m.boolean);
        fields.scalar("String", |m: &Self| &m.string, |m: &mut Self| &mut m.string);
    }
    model_id!();
}

/// A single indexed text field
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Labelled {
    pub id: String,
    pub string: String,
}

impl Model for Labelled {
    fn declare(fields: &mut FieldSet<Self>) {
        fields
            .scalar("String", |m: &Self| &m.string, |m: &mut Self| &mut m.string)
            .index();
    }
    model_id!();
}

/// No persisted fields at all
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
}

impl Model for Marker {
    fn declare(_fields: &mut FieldSet<Self>) {}
    model_id!();
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub value: i64,
}

/// Embeds an unexported aggregate only
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sealed {
    pub id: String,
    pub secret: Secret,
}

impl Model for Sealed {
    fn declare(fields: &mut FieldSet<Self>) {
        fields
            .embedded("secret", |m: &Self| &m.secret, |m: &mut Self| &mut m.secret)
            .private();
    }
    model_id!();
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

/// Requests an index on a timestamp-like aggregate
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub at: Timestamp,
}

impl Model for Appointment {
    fn declare(fields: &mut FieldSet<Self>) {
        fields
            .aggregate("At", |m: &Self| &m.at, |m: &mut Self| &mut m.at)
            .index();
    }
    model_id!();
}
