mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use stratum_import::{ErrorKind, ImportOptions, ImportStage, Importer};
use stratum_store::fakes::MemoryDocumentStore;
use stratum_store::{relation, DocumentStore};

use common::{feature, schema, trench};

#[tokio::test]
async fn trench_created_with_empty_recorded_in() {
    let store = MemoryDocumentStore::new();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer
        .import(vec![json!({
            "type": "Trench",
            "identifier": "t1",
            "shortDescription": "Our Trench 1"
        })])
        .await;

    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert_eq!(report.created_count, 1);
    assert_eq!(report.stage, ImportStage::Done);

    let stored = store
        .find_by_identifier("t1")
        .await
        .unwrap()
        .expect("t1 persisted");
    assert_eq!(stored.resource_type(), "Trench");
    assert!(stored.resource.relations.contains_key(relation::RECORDED_IN));
    assert!(stored.resource.relations.targets(relation::RECORDED_IN).is_empty());
    assert_eq!(stored.created.as_ref().map(|a| a.user.as_str()), Some("anonymous"));
}

#[tokio::test]
async fn unsupported_geometry_rejects_batch() {
    let store = MemoryDocumentStore::new();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer
        .import(vec![json!({
            "type": "Feature",
            "identifier": "obob1",
            "geometry": { "type": "UnsupportedGeometryType", "coordinates": [1, 2] }
        })])
        .await;

    assert_eq!(
        serde_json::to_value(&report.errors).unwrap(),
        json!([["UNSUPPORTED_GEOMETRY_TYPE", "UnsupportedGeometryType"]])
    );
    assert_eq!(report.created_count, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn duplicate_identifiers_reject_batch_before_writes() {
    let store = MemoryDocumentStore::new();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer
        .import(vec![
            json!({"type": "Trench", "identifier": "t1"}),
            json!({"type": "Trench", "identifier": "t2"}),
            json!({"type": "Trench", "identifier": "t1"}),
        ])
        .await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::DuplicateIdentifier);
    assert_eq!(report.errors[0].params, vec!["t1".to_string()]);
    assert_eq!(report.failed_at, Some(ImportStage::Validating));
    assert!(store.is_empty());
}

#[tokio::test]
async fn duplicate_identifiers_rejected_before_operation_lookup() {
    let store = MemoryDocumentStore::new();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new().into_operation("missing"));

    let report = importer
        .import(vec![
            json!({"type": "Feature", "identifier": "f1"}),
            json!({"type": "Feature", "identifier": "f1", "relations": {"isAfter": "x"}}),
        ])
        .await;

    assert_eq!(
        serde_json::to_value(&report.errors).unwrap(),
        json!([["DUPLICATE_IDENTIFIER", "f1"]])
    );
}

#[tokio::test]
async fn containment_resolved_from_parent_identifiers() {
    let store = MemoryDocumentStore::new();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new().with_identifiers());

    let report = importer
        .import(vec![
            json!({"type": "Trench", "identifier": "t1"}),
            json!({"type": "Feature", "identifier": "f1", "relations": {"parent": "t1"}}),
            json!({"type": "Find", "identifier": "fd1", "amount": 2, "relations": {"parent": "f1"}}),
        ])
        .await;
    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert_eq!(report.created_count, 3);

    let t1 = store.find_by_identifier("t1").await.unwrap().unwrap();
    let f1 = store.find_by_identifier("f1").await.unwrap().unwrap();
    let fd1 = store.find_by_identifier("fd1").await.unwrap().unwrap();

    // f1 lies directly within its operation, so liesWithin collapses.
    assert_eq!(f1.resource.recorded_in(), t1.id.as_deref());
    assert!(!f1.resource.relations.contains_key(relation::LIES_WITHIN));

    assert_eq!(fd1.resource.recorded_in(), t1.id.as_deref());
    assert_eq!(fd1.resource.lies_within(), f1.id.as_deref());
}

#[tokio::test]
async fn existing_identifier_rejected() {
    let store = MemoryDocumentStore::with_documents([trench("t1")]);
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer
        .import(vec![json!({"type": "Trench", "identifier": "t1"})])
        .await;
    assert_eq!(report.errors[0].kind, ErrorKind::ResourceExists);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn inverse_written_to_persisted_target() {
    let store = MemoryDocumentStore::with_documents([trench("op1"), feature("p1", "op1")]);
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
            "relations": {"isAfter": ["p1"]}
        })])
        .await;
    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert_eq!(report.relation_updates.len(), 1);

    let f1_id = report.created_ids[0].clone();
    let p1 = store.get("p1").await.unwrap();
    assert_eq!(p1.resource.relations.targets("isBefore"), [f1_id.clone()]);
    assert_eq!(p1.modified.len(), 1);

    let f1 = store.get(&f1_id).await.unwrap();
    assert_eq!(f1.resource.recorded_in(), Some("op1"));
}

#[tokio::test]
async fn cross_operation_relation_rejected() {
    let store = MemoryDocumentStore::with_documents([
        trench("op1"),
        trench("op2"),
        feature("p1", "op2"),
    ]);
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
            "relations": {"isAfter": ["p1"]}
        })])
        .await;

    assert_eq!(report.errors[0].kind, ErrorKind::MustBeInSameOperation);
    assert_eq!(report.failed_at, Some(ImportStage::RelationCompleting));
    assert!(store.find_by_identifier("f1").await.unwrap().is_none());
    assert_eq!(store.get("p1").await.unwrap(), feature("p1", "op2"));
}

#[tokio::test]
async fn operations_rejected_in_sub_import() {
    let store = MemoryDocumentStore::with_documents([trench("op1")]);
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new().into_operation("op1"));

    let report = importer
        .import(vec![json!({"type": "Trench", "identifier": "t9"})])
        .await;
    assert_eq!(report.errors[0].kind, ErrorKind::OperationsNotAllowed);
    assert_eq!(report.errors[0].params, vec!["t9".to_string()]);
}

#[tokio::test]
async fn authored_lies_within_forbidden_in_create_mode() {
    let store = MemoryDocumentStore::with_documents([trench("op1")]);
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer
        .import(vec![json!({
            "type": "Feature",
            "identifier": "f1",
            "relations": {"liesWithin": ["op1"]}
        })])
        .await;
    assert_eq!(
        serde_json::to_value(&report.errors).unwrap(),
        json!([["FORBIDDEN_RELATION", "f1", "liesWithin"]])
    );
}

#[tokio::test]
async fn image_creation_not_allowed() {
    let store = MemoryDocumentStore::new();
    let schema = schema();
    let importer = Importer::new(&store, &schema, ImportOptions::new());

    let report = importer
        .import(vec![json!({"type": "Photo", "identifier": "img1"})])
        .await;
    assert_eq!(report.errors[0].kind, ErrorKind::TypeNotAllowed);
}

#[tokio::test]
async fn batch_internal_inverses_completed() {
    let store = MemoryDocumentStore::with_documents([trench("op1")]);
    let schema = schema();
    let counter = AtomicUsize::new(0);
    let importer = Importer::new(
        &store,
        &schema,
        ImportOptions::new().into_operation("op1").with_identifiers(),
    )
    .with_id_generator(move || format!("id-{}", counter.fetch_add(1, Ordering::SeqCst)));

    let report = importer
        .import(vec![
            json!({"type": "Feature", "identifier": "f1", "relations": {"isAfter": ["f2"]}}),
            json!({"type": "Feature", "identifier": "f2"}),
        ])
        .await;
    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert_eq!(report.created_ids, vec!["id-0".to_string(), "id-1".to_string()]);

    let f2 = store.get("id-1").await.unwrap();
    assert_eq!(f2.resource.relations.targets("isBefore"), ["id-0".to_string()]);
    assert!(report.relation_updates.is_empty());
}
