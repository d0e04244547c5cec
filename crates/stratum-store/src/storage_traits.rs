//! Storage trait definitions for Stratum
//!
//! `DocumentStore` is the only persistence seam the import core depends on.
//! It is async and backend-agnostic. An in-memory fake is provided for
//! testing via the `fakes` module.

use async_trait::async_trait;

use crate::document::Document;
use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persisted document store.
///
/// Guarantees:
/// - `get(id)` returns `StorageError::NotFound` when no document has `id`.
/// - `find_by_identifier` returns `None` rather than an error when absent.
/// - `create` rejects documents without an id and ids already present.
/// - `update` rejects documents whose id is not present.
/// - `restore` writes a previously read version back verbatim, without
///   stamping, and rejects ids that are not present.
/// - `remove` is a no-op for absent documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, id: &str) -> StorageResult<Document>;

    /// Look up a document by its human-facing identifier.
    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<Document>>;

    /// Persist a new document and return the stored version.
    async fn create(&self, document: Document, user: &str) -> StorageResult<Document>;

    /// Overwrite an existing document and return the stored version.
    async fn update(&self, document: Document, user: &str) -> StorageResult<Document>;

    /// Write a previously read version back unchanged, stamps included.
    async fn restore(&self, document: &Document) -> StorageResult<()>;

    /// Delete a document.
    async fn remove(&self, document: &Document) -> StorageResult<()>;

    /// Ids of every stored document, sorted.
    async fn ids(&self) -> StorageResult<Vec<String>>;
}

/// Extract the id a write operation needs.
pub(crate) fn require_id(document: &Document) -> StorageResult<String> {
    document
        .id
        .clone()
        .ok_or_else(|| StorageError::MissingId {
            identifier: document.resource.identifier.clone(),
        })
}
