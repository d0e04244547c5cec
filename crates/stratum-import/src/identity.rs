//! Identity resolution.
//!
//! Decides for every candidate whether it creates a new resource or
//! updates a persisted one, assigns ids, and rewrites relation targets
//! from identifiers to ids when the batch is identifier-keyed.

use std::collections::{BTreeMap, BTreeSet};

use stratum_store::{Document, DocumentStore, StorageError};
use tracing::debug;

use crate::error::{ImportError, Result};
use crate::merge::merge_into;
use crate::options::{ImportOptions, UnmatchedMergePolicy};

/// Source of ids for newly created documents.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// A document on its way through the pipeline.
///
/// `previous` is the persisted version a merge-mode candidate updates;
/// `None` means the document will be created.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub document: Document,
    pub previous: Option<Document>,
}

impl Candidate {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            previous: None,
        }
    }

    pub fn updating(document: Document, previous: Document) -> Self {
        Self {
            document,
            previous: Some(previous),
        }
    }

    pub fn id(&self) -> &str {
        self.document.id_str()
    }

    pub fn identifier(&self) -> &str {
        self.document.identifier()
    }

    pub fn is_update(&self) -> bool {
        self.previous.is_some()
    }
}

/// Fail on the first identifier that occurs twice.
pub fn assert_unique<'a>(identifiers: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for identifier in identifiers {
        if !seen.insert(identifier) {
            return Err(ImportError::DuplicateIdentifier(identifier.to_string()));
        }
    }
    Ok(())
}

/// Fail on the first identifier that occurs twice in the batch.
pub fn assert_no_duplicates(documents: &[Document]) -> Result<()> {
    assert_unique(documents.iter().map(Document::identifier))
}

/// Resolve identities of a validated batch.
///
/// Create mode assigns ids and rejects identifiers or ids that already
/// exist. Merge mode matches candidates to persisted documents by
/// identifier and merges them; unmatched candidates follow
/// [`UnmatchedMergePolicy`].
pub async fn resolve_identities<S, G>(
    documents: Vec<Document>,
    store: &S,
    ids: &G,
    options: &ImportOptions,
) -> Result<Vec<Candidate>>
where
    S: DocumentStore + ?Sized,
    G: IdGenerator + ?Sized,
{
    assert_no_duplicates(&documents)?;

    let mut located = Vec::with_capacity(documents.len());
    for document in documents {
        let entry = if options.merge_mode {
            locate_update_target(document, store, options).await?
        } else {
            Some(assign_new_id(document, store, ids).await?)
        };
        located.extend(entry);
    }

    let id_by_identifier: BTreeMap<String, String> = located
        .iter()
        .map(|(doc, _)| (doc.identifier().to_string(), doc.id_str().to_string()))
        .collect();
    let batch_ids: BTreeSet<String> = id_by_identifier.values().cloned().collect();

    let mut candidates = Vec::with_capacity(located.len());
    for (mut document, previous) in located {
        if options.use_identifiers_in_relations {
            rewrite_identifiers(&mut document, &id_by_identifier, store).await?;
        } else if !options.merge_mode {
            check_id_targets(&document, &batch_ids, store).await?;
        }

        let candidate = match previous {
            Some(previous) => {
                let merged = merge_into(&previous, document, options.permit_deletions)?;
                Candidate::updating(merged, previous)
            }
            None => Candidate::new(document),
        };
        candidates.push(candidate);
    }
    Ok(candidates)
}

async fn assign_new_id<S, G>(document: Document, store: &S, ids: &G) -> Result<(Document, Option<Document>)>
where
    S: DocumentStore + ?Sized,
    G: IdGenerator + ?Sized,
{
    if store.find_by_identifier(document.identifier()).await?.is_some() {
        return Err(ImportError::ResourceExists(document.identifier().to_string()));
    }
    let document = match document.id.clone() {
        Some(id) => {
            match store.get(&id).await {
                Ok(_) => return Err(ImportError::ResourceExists(document.identifier().to_string())),
                Err(StorageError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
            document
        }
        None => document.with_id(ids.generate()),
    };
    Ok((document, None))
}

async fn locate_update_target<S>(
    document: Document,
    store: &S,
    options: &ImportOptions,
) -> Result<Option<(Document, Option<Document>)>>
where
    S: DocumentStore + ?Sized,
{
    match store.find_by_identifier(document.identifier()).await? {
        Some(existing) => {
            let id = existing.id_str().to_string();
            Ok(Some((document.with_id(id), Some(existing))))
        }
        None => match options.unmatched_merge_policy {
            UnmatchedMergePolicy::Drop => {
                debug!(identifier = %document.identifier(), "no persisted resource to merge into, skipping");
                Ok(None)
            }
            UnmatchedMergePolicy::Reject => Err(ImportError::UpdateTargetNotFound(
                document.identifier().to_string(),
            )),
        },
    }
}

/// Replace identifier targets with ids: batch first, then the store.
///
/// Self-references are dropped; a relation emptied that way is removed.
/// Empty lists that arrive empty are deletion markers and stay.
async fn rewrite_identifiers<S>(
    document: &mut Document,
    id_by_identifier: &BTreeMap<String, String>,
    store: &S,
) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    let own_identifier = document.identifier().to_string();
    let relations: Vec<(String, Vec<String>)> = document
        .resource
        .relations
        .iter()
        .map(|(name, targets)| (name.clone(), targets.clone()))
        .collect();

    for (name, targets) in relations {
        if targets.is_empty() {
            continue;
        }
        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            if target == own_identifier {
                continue;
            }
            let id = match id_by_identifier.get(&target) {
                Some(id) => id.clone(),
                None => match store.find_by_identifier(&target).await? {
                    Some(found) => found.id_str().to_string(),
                    None => return Err(ImportError::MissingRelationTarget(target)),
                },
            };
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
        if resolved.is_empty() {
            document.resource.relations.remove(&name);
        } else {
            document.resource.relations.set(name, resolved);
        }
    }
    Ok(())
}

/// Every id target must exist in the batch or the store.
async fn check_id_targets<S>(document: &Document, batch_ids: &BTreeSet<String>, store: &S) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    for target in document.resource.relations.all_targets() {
        if batch_ids.contains(target) {
            continue;
        }
        match store.get(target).await {
            Ok(_) => {}
            Err(StorageError::NotFound { .. }) => {
                return Err(ImportError::MissingRelationTarget(target.to_string()))
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
