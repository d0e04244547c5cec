//! Merging a candidate onto the persisted document it updates.

use serde_json::Value;
use stratum_store::{relation, Document};

use crate::error::{ImportError, Result};

/// Merge `candidate` onto `existing`.
///
/// - Candidate field values win. `null` values delete the field when
///   `permit_deletions` is set and are ignored otherwise.
/// - Without `permit_deletions`, candidate relation targets are added to
///   the persisted lists and nothing is removed.
/// - With `permit_deletions`, each candidate relation replaces the persisted
///   one; an empty list deletes it. Relations the candidate does not name
///   are kept.
/// - Hierarchy relations are single-valued and always replaced.
/// - Identity (`id`, identifier, stamps) comes from `existing`.
pub fn merge_into(existing: &Document, candidate: Document, permit_deletions: bool) -> Result<Document> {
    let Document {
        resource: incoming, ..
    } = candidate;

    if incoming.resource_type != existing.resource.resource_type {
        return Err(ImportError::TypeCannotBeChanged {
            identifier: existing.resource.identifier.clone(),
            from: existing.resource.resource_type.clone(),
            to: incoming.resource_type,
        });
    }

    let mut merged = existing.clone();
    let resource = &mut merged.resource;

    for (name, value) in incoming.fields {
        match value {
            Value::Null if permit_deletions => {
                resource.fields.remove(&name);
            }
            Value::Null => {}
            value => {
                resource.fields.insert(name, value);
            }
        }
    }

    for (name, targets) in incoming.relations.iter() {
        if permit_deletions || relation::is_hierarchy(name) {
            if targets.is_empty() {
                resource.relations.remove(name);
            } else {
                resource.relations.set(name.clone(), targets.clone());
            }
        } else {
            for target in targets {
                resource.relations.insert_target(name, target);
            }
        }
    }

    Ok(merged)
}
