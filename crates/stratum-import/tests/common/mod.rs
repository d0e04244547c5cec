#![allow(dead_code)]

use stratum_import::ProjectSchema;
use stratum_store::{relation, Document, Resource};

pub fn schema() -> ProjectSchema {
    ProjectSchema::from_json(
        r#"{
            "types": [
                { "name": "Operation", "fields": [{ "name": "shortDescription" }] },
                { "name": "Trench", "parent": "Operation" },
                { "name": "Place", "fields": [{ "name": "shortDescription" }] },
                { "name": "Feature", "fields": [
                    { "name": "shortDescription" },
                    { "name": "period", "inputType": "dropdownRange" }
                ] },
                { "name": "Find", "fields": [
                    { "name": "shortDescription" },
                    { "name": "amount", "inputType": "unsignedInt", "mandatory": true }
                ] },
                { "name": "Image", "fields": [{ "name": "shortDescription" }] },
                { "name": "Photo", "parent": "Image" }
            ],
            "relations": [
                { "name": "isAfter", "inverse": "isBefore", "domain": ["Feature"], "range": ["Feature"] },
                { "name": "isBefore", "inverse": "isAfter", "domain": ["Feature"], "range": ["Feature"] },
                { "name": "liesWithin", "domain": ["Feature", "Find"], "range": ["Feature", "Operation"] },
                { "name": "liesWithin", "domain": ["Operation"], "range": ["Place"] },
                { "name": "recordedIn", "domain": ["Feature", "Find"], "range": ["Operation"] }
            ]
        }"#,
    )
    .expect("test schema parses")
}

pub fn trench(id: &str) -> Document {
    Document::new(Resource::new(id, "Trench").with_relation(relation::RECORDED_IN, vec![]))
        .with_id(id)
}

pub fn feature(id: &str, operation: &str) -> Document {
    Document::new(
        Resource::new(id, "Feature").with_relation(relation::RECORDED_IN, vec![operation.to_string()]),
    )
    .with_id(id)
}

pub fn with_relation(mut document: Document, name: &str, targets: &[&str]) -> Document {
    document
        .resource
        .relations
        .set(name, targets.iter().map(|t| t.to_string()).collect());
    document
}
