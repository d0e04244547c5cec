//! Inverse relation completion.
//!
//! Two phases:
//! - batch: inverses between candidates of the same batch are inserted
//!   directly into the candidates (append-only, idempotent).
//! - store: persisted targets are fetched once per batch, their inverse
//!   lists are brought in line with the candidates' relations, and the
//!   changed targets are returned for writing back.

use std::collections::{BTreeMap, BTreeSet};

use stratum_store::{relation, Document, DocumentStore, Relations, StorageError};
use tracing::debug;

use crate::error::{ImportError, Result};
use crate::identity::Candidate;
use crate::schema::SchemaProvider;

/// Relations computed by the hierarchy phase; never completed here.
fn is_structural(name: &str) -> bool {
    relation::is_hierarchy(name) || name == relation::INCLUDES
}

/// Non-structural relations of `relations`, cloned.
fn authored(relations: &Relations) -> Vec<(String, Vec<String>)> {
    relations
        .iter()
        .filter(|(name, _)| !is_structural(name))
        .map(|(name, targets)| (name.clone(), targets.clone()))
        .collect()
}

/// A persisted document whose inverse relations the batch rewrites.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationUpdate {
    /// Version read from the store, restored if the batch is rolled back.
    pub original: Document,
    pub updated: Document,
}

/// Complete inverse relations within the batch and against the store.
///
/// Returns the completed candidates and the persisted documents whose
/// inverse relations changed.
pub async fn complete_relations<S, P>(
    candidates: Vec<Candidate>,
    store: &S,
    schema: &P,
) -> Result<(Vec<Candidate>, Vec<RelationUpdate>)>
where
    S: DocumentStore + ?Sized,
    P: SchemaProvider + ?Sized,
{
    let candidates = complete_batch(candidates, schema)?;
    let updates = complete_against_store(&candidates, store, schema).await?;
    Ok((candidates, updates))
}

/// Insert inverses between batch candidates.
pub fn complete_batch<P>(mut candidates: Vec<Candidate>, schema: &P) -> Result<Vec<Candidate>>
where
    P: SchemaProvider + ?Sized,
{
    let index: BTreeMap<String, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id().to_string(), i))
        .collect();

    for i in 0..candidates.len() {
        let source = candidates[i].document.clone();
        assert_well_interrelated(&source, schema)?;

        for (name, targets) in authored(&source.resource.relations) {
            if targets.is_empty() {
                return Err(ImportError::EmptyRelation(source.identifier().to_string()));
            }
            let inverse = schema.inverse_relation_name(&name);
            for target_id in &targets {
                let Some(&j) = index.get(target_id) else {
                    continue;
                };
                if j == i {
                    continue;
                }
                let target = &mut candidates[j].document;
                assert_allowed_target(&source, &name, target, schema)?;
                assert_same_operation(&source, target)?;
                if let Some(inverse) = &inverse {
                    target
                        .resource
                        .relations
                        .insert_target(inverse, source.id_str());
                    assert_well_interrelated(target, schema)?;
                }
            }
        }
    }
    Ok(candidates)
}

/// One persisted target the batch has touched.
#[derive(Debug, Clone)]
struct Touched {
    original: Document,
    current: Document,
}

/// Persisted targets touched so far, in first-touch order.
#[derive(Debug, Default)]
struct TouchedTargets {
    entries: Vec<Touched>,
    index: BTreeMap<String, usize>,
}

impl TouchedTargets {
    fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        let i = *self.index.get(id)?;
        Some(&mut self.entries[i].current)
    }

    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn insert(&mut self, document: Document) {
        self.index
            .insert(document.id_str().to_string(), self.entries.len());
        self.entries.push(Touched {
            original: document.clone(),
            current: document,
        });
    }

    /// Targets whose inverse lists actually changed.
    fn into_changed(self) -> Vec<RelationUpdate> {
        self.entries
            .into_iter()
            .filter(|t| t.current != t.original)
            .map(|t| RelationUpdate {
                original: t.original,
                updated: t.current,
            })
            .collect()
    }
}

/// Align inverse relations on persisted targets, one candidate at a time.
pub async fn complete_against_store<S, P>(
    candidates: &[Candidate],
    store: &S,
    schema: &P,
) -> Result<Vec<RelationUpdate>>
where
    S: DocumentStore + ?Sized,
    P: SchemaProvider + ?Sized,
{
    let batch_ids: BTreeSet<&str> = candidates.iter().map(Candidate::id).collect();
    let mut touched = TouchedTargets::default();
    for candidate in candidates {
        touched = complete_candidate(candidate, &batch_ids, touched, store, schema).await?;
    }
    let changed = touched.into_changed();
    debug!(count = changed.len(), "persisted documents need inverse updates");
    Ok(changed)
}

async fn complete_candidate<S, P>(
    candidate: &Candidate,
    batch_ids: &BTreeSet<&str>,
    mut touched: TouchedTargets,
    store: &S,
    schema: &P,
) -> Result<TouchedTargets>
where
    S: DocumentStore + ?Sized,
    P: SchemaProvider + ?Sized,
{
    let source = &candidate.document;
    let source_id = source.id_str();
    let current = authored(&source.resource.relations);
    let previous = candidate
        .previous
        .as_ref()
        .map(|p| authored(&p.resource.relations))
        .unwrap_or_default();

    // Inverse names whose membership depends on this source.
    let inverses: BTreeSet<String> = current
        .iter()
        .chain(previous.iter())
        .filter_map(|(name, _)| schema.inverse_relation_name(name))
        .collect();

    let current_targets: BTreeSet<&str> = current
        .iter()
        .flat_map(|(_, targets)| targets.iter().map(String::as_str))
        .collect();
    let mut targets: Vec<&str> = Vec::new();
    for (_, list) in current.iter().chain(previous.iter()) {
        for target in list {
            let target = target.as_str();
            if target != source_id && !batch_ids.contains(target) && !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    for target_id in targets {
        let is_current = current_targets.contains(target_id);
        if !touched.contains(target_id) {
            match store.get(target_id).await {
                Ok(document) => touched.insert(document),
                Err(StorageError::NotFound { .. }) if !is_current => continue,
                Err(StorageError::NotFound { .. }) => {
                    return Err(ImportError::MissingRelationTarget(target_id.to_string()))
                }
                Err(err) => return Err(err.into()),
            }
        }
        let Some(target) = touched.get_mut(target_id) else {
            continue;
        };

        if is_current {
            for (name, list) in &current {
                if list.iter().any(|t| t == target_id) {
                    assert_allowed_target(source, name, target, schema)?;
                }
            }
            assert_same_operation(source, target)?;
        }

        for inverse in &inverses {
            let linked = current.iter().any(|(name, list)| {
                list.iter().any(|t| t == target_id)
                    && schema.inverse_relation_name(name).as_deref() == Some(inverse.as_str())
            });
            let relations = &mut target.resource.relations;
            if linked {
                relations.insert_target(inverse, source_id);
            } else {
                relations.remove_target(inverse, source_id);
            }
        }
        assert_well_interrelated(target, schema)?;
    }
    Ok(touched)
}

/// A document must not list the same target under a relation and its
/// (distinct) inverse.
fn assert_well_interrelated<P>(document: &Document, schema: &P) -> Result<()>
where
    P: SchemaProvider + ?Sized,
{
    let relations = &document.resource.relations;
    for (name, targets) in relations.iter() {
        let Some(inverse) = schema.inverse_relation_name(name) else {
            continue;
        };
        if &inverse == name {
            continue;
        }
        let opposite = relations.targets(&inverse);
        if targets.iter().any(|t| opposite.contains(t)) {
            return Err(ImportError::BadInterrelation(document.identifier().to_string()));
        }
    }
    Ok(())
}

fn assert_allowed_target<P>(source: &Document, name: &str, target: &Document, schema: &P) -> Result<()>
where
    P: SchemaProvider + ?Sized,
{
    if schema.is_allowed_relation_domain(source.resource_type(), target.resource_type(), name) {
        return Ok(());
    }
    Err(ImportError::TargetTypeRangeMismatch {
        identifier: source.identifier().to_string(),
        relation: name.to_string(),
        target_type: target.resource_type().to_string(),
    })
}

/// Related documents share their operation; unrecorded endpoints are exempt.
fn assert_same_operation(source: &Document, target: &Document) -> Result<()> {
    match (source.resource.recorded_in(), target.resource.recorded_in()) {
        (Some(a), Some(b)) if a != b => Err(ImportError::MustBeInSameOperation {
            source_identifier: source.identifier().to_string(),
            target_identifier: target.identifier().to_string(),
        }),
        _ => Ok(()),
    }
}
