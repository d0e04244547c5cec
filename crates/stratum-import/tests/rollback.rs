//! Create-mode batches that fail while persisting leave the store as it was.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use stratum_import::{ErrorKind, ImportOptions, ImportStage, Importer};
use stratum_store::fakes::MemoryDocumentStore;
use stratum_store::{Document, DocumentStore, StorageError, StorageResult};

use common::{feature, schema, trench};

/// Delegates to a memory store but fails the n-th `create` or `update` and,
/// optionally, every `remove`.
struct FlakyStore {
    inner: MemoryDocumentStore,
    creates_before_failure: usize,
    updates_before_failure: usize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    removes: AtomicUsize,
    fail_removes: bool,
}

impl FlakyStore {
    fn new(inner: MemoryDocumentStore, creates_before_failure: usize) -> Self {
        Self {
            inner,
            creates_before_failure,
            updates_before_failure: usize::MAX,
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            fail_removes: false,
        }
    }

    fn failing_update_after(mut self, updates: usize) -> Self {
        self.updates_before_failure = updates;
        self
    }

    fn failing_removes(mut self) -> Self {
        self.fail_removes = true;
        self
    }

    fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, id: &str) -> StorageResult<Document> {
        self.inner.get(id).await
    }

    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<Document>> {
        self.inner.find_by_identifier(identifier).await
    }

    async fn create(&self, document: Document, user: &str) -> StorageResult<Document> {
        if self.creates.fetch_add(1, Ordering::SeqCst) >= self.creates_before_failure {
            return Err(StorageError::Backend("disk full".to_string()));
        }
        self.inner.create(document, user).await
    }

    async fn update(&self, document: Document, user: &str) -> StorageResult<Document> {
        if self.updates.fetch_add(1, Ordering::SeqCst) >= self.updates_before_failure {
            return Err(StorageError::Backend("disk full".to_string()));
        }
        self.inner.update(document, user).await
    }

    async fn restore(&self, document: &Document) -> StorageResult<()> {
        self.inner.restore(document).await
    }

    async fn remove(&self, document: &Document) -> StorageResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if self.fail_removes {
            return Err(StorageError::Backend("read-only".to_string()));
        }
        self.inner.remove(document).await
    }

    async fn ids(&self) -> StorageResult<Vec<String>> {
        self.inner.ids().await
    }
}

fn batch() -> Vec<serde_json::Value> {
    vec![
        json!({"type": "Trench", "identifier": "t1"}),
        json!({"type": "Trench", "identifier": "t2"}),
        json!({"type": "Trench", "identifier": "t3"}),
    ]
}

#[tokio::test]
async fn failed_create_rolls_back_earlier_writes() {
    let store = FlakyStore::new(MemoryDocumentStore::with_documents([trench("existing")]), 2);
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer.import(batch()).await;

    assert_eq!(report.stage, ImportStage::Failed);
    assert_eq!(report.failed_at, Some(ImportStage::Persisting));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::Storage);
    assert_eq!(report.created_count, 0);
    assert_eq!(store.ids().await.unwrap(), vec!["existing".to_string()]);
}

#[tokio::test]
async fn rollback_failure_reported_after_original_error() {
    let store = FlakyStore::new(MemoryDocumentStore::new(), 1).failing_removes();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer.import(batch()).await;

    let kinds: Vec<ErrorKind> = report.errors.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::Storage, ErrorKind::RollbackFailed]);
    assert_eq!(report.created_ids.len(), 1);
    assert_eq!(report.errors[1].params, report.created_ids);
}

#[tokio::test]
async fn failed_inverse_write_restores_rewritten_targets() {
    let p1 = feature("p1", "op1");
    let p2 = feature("p2", "op1");
    let seeded = MemoryDocumentStore::with_documents([trench("op1"), p1.clone(), p2.clone()]);
    let store = FlakyStore::new(seeded, usize::MAX).failing_update_after(1);
    let schema = schema();
    let importer = Importer::new(
        &store,
        &schema,
        ImportOptions::new().into_operation("op1").with_identifiers(),
    );

    let report = importer
        .import(vec![json!({
            "type": "Feature",
            "identifier": "f1",
            "relations": {"isAfter": ["p1", "p2"]}
        })])
        .await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::Storage);
    assert!(report.created_ids.is_empty());
    assert!(report.relation_updates.is_empty());
    assert!(store.find_by_identifier("f1").await.unwrap().is_none());
    assert_eq!(store.get("p1").await.unwrap(), p1);
    assert_eq!(store.get("p2").await.unwrap(), p2);
}

#[tokio::test]
async fn partial_rollback_reports_only_surviving_documents() {
    let store = FlakyStore::new(MemoryDocumentStore::new(), 2).failing_removes();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer.import(batch()).await;

    assert_eq!(report.created_ids.len(), 2);
    let mut stored = store.ids().await.unwrap();
    stored.sort();
    let mut reported = report.created_ids.clone();
    reported.sort();
    assert_eq!(reported, stored);
}

#[tokio::test]
async fn merge_batches_are_not_rolled_back() {
    let seeded = MemoryDocumentStore::with_documents([trench("t1"), trench("t2")]);
    let store = FlakyStore::new(seeded, 0).failing_update_after(1);
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new().merge());

    let report = importer
        .import(vec![
            json!({"type": "Trench", "identifier": "t1", "shortDescription": "first"}),
            json!({"type": "Trench", "identifier": "t2", "shortDescription": "second"}),
        ])
        .await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::Storage);
    assert_eq!(report.failed_at, Some(ImportStage::Persisting));
    assert_eq!(report.updated_ids, vec!["t1".to_string()]);
    assert_eq!(store.remove_calls(), 0);
    let t1 = store.get("t1").await.unwrap();
    assert_eq!(t1.resource.fields["shortDescription"], "first");
    assert!(!store
        .get("t2")
        .await
        .unwrap()
        .resource
        .fields
        .contains_key("shortDescription"));
}

#[tokio::test]
async fn merge_batches_update_in_place() {
    let store = FlakyStore::new(MemoryDocumentStore::with_documents([trench("t1")]), 0);
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new().merge());

    let report = importer
        .import(vec![json!({"type": "Trench", "identifier": "t1", "shortDescription": "kept"})])
        .await;

    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert_eq!(report.updated_count, 1);
    let t1 = store.get("t1").await.unwrap();
    assert_eq!(t1.resource.fields["shortDescription"], "kept");
}
