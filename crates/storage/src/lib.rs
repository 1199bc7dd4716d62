//! Backing-store layer for stratamodel
//!
//! This crate implements the seam between the engine and the key-value
//! store:
//! - Command/Reply: the command subset the engine issues and its replies
//! - Connection/Backend: traits every store implements
//! - ConnectionPool: bounded pool of idle connections with scoped handles
//! - RedisBackend: a Redis server over the `redis` crate
//! - MemoryBackend: an in-process keyspace with the same semantics
//! - Script: the server-side script catalogue
//!
//! # Atomicity
//!
//! Multi-key updates are never made atomic on the client. Each script and
//! each batch executes as one indivisible unit on the store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod memory;
pub mod pool;
pub mod redis_backend;
pub mod reply;
pub mod scripts;
pub mod traits;

pub use command::{format_score, Command};
pub use memory::{MemoryBackend, MemoryConnection};
pub use pool::{ConnectionPool, PooledConnection, DEFAULT_MAX_IDLE};
pub use redis_backend::{RedisBackend, RedisConnection, RedisSettings};
pub use reply::{parse_score, Reply};
pub use scripts::Script;
pub use traits::{Backend, Connection};
