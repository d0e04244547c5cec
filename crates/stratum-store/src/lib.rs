//! Stratum-Store: persisted documents for Stratum
//!
//! This crate owns the document shape shared by every Stratum component and
//! the storage seam the import core talks to.
//!
//! ## Key Components
//!
//! - `Document` / `Resource` / `Relations`: the persisted record shape
//! - `DocumentStore`: async store trait (get, find by identifier, create, update, restore, remove)
//! - `MemoryDocumentStore`: in-memory fake for tests and dry runs
//! - `SurrealDocumentStore`: SurrealDB-backed store (in-memory, local or remote)

mod config;
mod document;
mod error;
pub mod fakes;
mod migrations;
pub mod storage_traits;
pub mod surreal_store;

pub use config::StoreConfig;
pub use document::{
    relation, Action, Document, Relations, Resource, ResourceFields,
};
pub use error::{StateError, StorageError};
pub use storage_traits::{DocumentStore, StorageResult};
pub use surreal_store::SurrealDocumentStore;

/// Result type for store setup operations
pub type Result<T> = std::result::Result<T, StateError>;
