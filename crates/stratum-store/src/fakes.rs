//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryDocumentStore`, which satisfies the `DocumentStore`
//! contract without any external dependencies.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::document::{Action, Document};
use crate::error::StorageError;
use crate::storage_traits::{require_id, DocumentStore, StorageResult};

/// In-memory document store backed by a `BTreeMap<id, Document>`.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with already-persisted documents.
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        {
            let mut map = store.lock();
            for doc in documents {
                if let Some(id) = doc.id.clone() {
                    map.insert(id, doc);
                }
            }
        }
        store
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Document>> {
        // A poisoned map is still structurally valid.
        self.documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, id: &str) -> StorageResult<Document> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<Document>> {
        Ok(self
            .lock()
            .values()
            .find(|d| d.resource.identifier == identifier)
            .cloned())
    }

    async fn create(&self, mut document: Document, user: &str) -> StorageResult<Document> {
        let id = require_id(&document)?;
        let mut map = self.lock();
        if map.contains_key(&id) {
            return Err(StorageError::Duplicate { id });
        }
        document.resource.id = Some(id.clone());
        document.created = Some(Action::now(user));
        map.insert(id, document.clone());
        Ok(document)
    }

    async fn update(&self, mut document: Document, user: &str) -> StorageResult<Document> {
        let id = require_id(&document)?;
        let mut map = self.lock();
        if !map.contains_key(&id) {
            return Err(StorageError::NotFound { id });
        }
        document.modified.push(Action::now(user));
        map.insert(id, document.clone());
        Ok(document)
    }

    async fn restore(&self, document: &Document) -> StorageResult<()> {
        let id = require_id(document)?;
        let mut map = self.lock();
        match map.get_mut(&id) {
            Some(stored) => {
                *stored = document.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound { id }),
        }
    }

    async fn remove(&self, document: &Document) -> StorageResult<()> {
        let id = require_id(document)?;
        self.lock().remove(&id);
        Ok(())
    }

    async fn ids(&self) -> StorageResult<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }
}
