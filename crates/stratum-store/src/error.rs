//! Error types for stratum-store

use thiserror::Error;

/// Errors raised while connecting to or preparing a store backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by [`crate::DocumentStore`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No document with this id
    #[error("document not found: {id}")]
    NotFound { id: String },

    /// A document with this id already exists
    #[error("document already exists: {id}")]
    Duplicate { id: String },

    /// Create/update/remove called on a document that carries no id
    #[error("document {identifier} has no id")]
    MissingId { identifier: String },

    /// Serialization error at the backend boundary
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Backend-specific failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
