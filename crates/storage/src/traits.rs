//! Backend traits
//!
//! These traits define the seam between the engine and a backing store.
//! The engine only ever talks to a [`Connection`] obtained from a
//! [`Backend`], through a [`crate::ConnectionPool`].

use crate::command::Command;
use crate::reply::Reply;
use strata_model_core::StoreResult;

/// An open connection to the backing store
///
/// # Atomicity
///
/// `execute` runs one command; a catalogued script runs to completion
/// without interleaving. `execute_atomic` runs a batch the same way
/// (`MULTI`/`EXEC` on Redis), returning one reply per command.
///
/// # Errors
///
/// Transport failures are `StoreError::Connection` or `StoreError::Timeout`
/// and leave the connection unusable. Error replies from the store are
/// `StoreError::Protocol` or `StoreError::Script`.
pub trait Connection: Send {
    /// Run a single command
    fn execute(&mut self, command: &Command) -> StoreResult<Reply>;

    /// Run a batch as one indivisible unit
    fn execute_atomic(&mut self, commands: &[Command]) -> StoreResult<Vec<Reply>>;
}

/// A source of connections
pub trait Backend: Send + Sync {
    /// Open a new connection
    fn connect(&self) -> StoreResult<Box<dyn Connection>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}
