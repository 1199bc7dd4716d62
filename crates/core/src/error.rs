//! Error types for stratamodel
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Error Kinds
//!
//! - [`SchemaError`]: raised while compiling or registering a model type.
//!   Never produced by a runtime operation.
//! - [`StoreError`]: transport failure talking to the backing store
//!   (connection, timeout, protocol). Always surfaced, never retried here.
//! - [`ModelError`]: everything an operation on a collection can return,
//!   wrapping the two kinds above plus conversion and not-found conditions.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Result type alias for backing-store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised while compiling or registering a model type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// An index was requested on a field whose kind or type cannot be indexed
    #[error("Requested index on unsupported type {type_name} (field {field})")]
    UnsupportedIndex {
        /// Declared field name
        field: String,
        /// Declared type of the field
        type_name: String,
    },

    /// Two included fields share a declared or store name
    #[error("Duplicate field name {field} in model {model}")]
    DuplicateField {
        /// Model type name
        model: String,
        /// The repeated name
        field: String,
    },

    /// A collection with this logical name is already registered
    #[error("Collection name {name} is already registered")]
    DuplicateName {
        /// The logical name
        name: String,
    },

    /// The model type is already registered under another name
    #[error("Model type {type_name} is already registered as {name}")]
    DuplicateType {
        /// Rust type name of the model
        type_name: String,
        /// Name it was registered under
        name: String,
    },

    /// Collection or field name cannot be used in a key
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Transport failure talking to the backing store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Could not connect, or the connection was dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store did not answer within the configured timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The store answered with an error or an unexpected reply shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A server-side script failed
    #[error("Script {script} failed: {message}")]
    Script {
        /// Script name
        script: String,
        /// Server message
        message: String,
    },

    /// Connection pool could not hand out a connection
    #[error("Pool error: {0}")]
    Pool(String),
}

impl StoreError {
    /// Whether the connection that produced this error should be discarded
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout(_))
    }
}

/// Errors returned by collection operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// Schema compilation or registration failed
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Stored text could not be parsed into the field's declared type
    #[error("Cannot convert stored value {raw:?} for field {field}")]
    Conversion {
        /// Declared field name
        field: String,
        /// Raw stored text (lossy UTF-8)
        raw: String,
    },

    /// A value could not be encoded for storage
    #[error("Cannot encode field {field}: {reason}")]
    Encoding {
        /// Declared field name
        field: String,
        /// Codec message
        reason: String,
    },

    /// No record with this identifier exists in the collection
    #[error("Model not found: {collection}:{id}")]
    NotFound {
        /// Collection name
        collection: String,
        /// Record identifier
        id: String,
    },

    /// Backing store transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] StoreError),

    /// A field name passed to a partial operation is not in the schema
    #[error("Collection {collection} has no field named {field}")]
    UnknownField {
        /// Collection name
        collection: String,
        /// Requested field name
        field: String,
    },

    /// A field value is not acceptable for its index
    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue {
        /// Declared field name
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Identifier cannot be stored
    #[error("Invalid model id {id:?}: {reason}")]
    InvalidId {
        /// The rejected identifier
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// The operation needs a capability the collection was registered without
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl ModelError {
    /// Check if this error indicates the record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. })
    }

    /// Check if this error came from the transport
    pub fn is_transport(&self) -> bool {
        matches!(self, ModelError::Transport(_))
    }

    /// Check if this error came from schema compilation or registration
    pub fn is_schema(&self) -> bool {
        matches!(self, ModelError::Schema(_))
    }

    /// Check if this error is a per-field conversion failure
    pub fn is_conversion(&self) -> bool {
        matches!(self, ModelError::Conversion { .. })
    }
}
