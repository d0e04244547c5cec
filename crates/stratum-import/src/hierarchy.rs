//! Containment resolution.
//!
//! Derives `recordedIn` from `liesWithin` chains and the batch operation,
//! rejects contradicting assignments and drops `liesWithin` when it points
//! straight at the operation.

use std::collections::{BTreeMap, BTreeSet};

use stratum_store::{relation, Document, DocumentStore, StorageError};

use crate::error::{ImportError, Result};
use crate::identity::Candidate;
use crate::options::ImportOptions;
use crate::schema::SchemaProvider;

/// Resolve containment for every candidate whose hierarchy is new or
/// changed.
///
/// Afterwards every resolved document carries a `recordedIn` key (empty
/// for operations and unassigned documents).
pub async fn resolve_hierarchy<S, P>(
    mut candidates: Vec<Candidate>,
    store: &S,
    schema: &P,
    options: &ImportOptions,
) -> Result<Vec<Candidate>>
where
    S: DocumentStore + ?Sized,
    P: SchemaProvider + ?Sized,
{
    let batch: BTreeMap<String, Document> = candidates
        .iter()
        .map(|c| (c.id().to_string(), c.document.clone()))
        .collect();
    let resolver = Resolver {
        batch: &batch,
        store,
        schema,
        options,
    };

    for candidate in candidates.iter_mut() {
        if !needs_resolution(candidate) {
            continue;
        }
        let recorded_in = resolver.resolve(candidate).await?;
        let relations = &mut candidate.document.resource.relations;
        if recorded_in.is_some() && relations.first(relation::LIES_WITHIN) == recorded_in.as_deref() {
            relations.remove(relation::LIES_WITHIN);
        }
        relations.set(relation::RECORDED_IN, recorded_in.into_iter().collect());
    }

    if !options.merge_mode {
        for candidate in &candidates {
            assert_operation_assigned(&candidate.document, schema)?;
        }
    }
    Ok(candidates)
}

/// New documents and updates that move or reassign the resource.
fn needs_resolution(candidate: &Candidate) -> bool {
    let Some(previous) = &candidate.previous else {
        return true;
    };
    let current = &candidate.document.resource.relations;
    let before = &previous.resource.relations;
    current.targets(relation::LIES_WITHIN) != before.targets(relation::LIES_WITHIN)
        || current.targets(relation::RECORDED_IN) != before.targets(relation::RECORDED_IN)
}

fn assert_operation_assigned<P>(document: &Document, schema: &P) -> Result<()>
where
    P: SchemaProvider + ?Sized,
{
    let resource_type = document.resource_type();
    if schema.is_operation_type(resource_type) || document.resource.recorded_in().is_some() {
        return Ok(());
    }
    let needs_operation = schema
        .relation_defs(resource_type)
        .iter()
        .any(|r| r.name == relation::RECORDED_IN);
    if needs_operation {
        return Err(ImportError::NoOperationAssigned(document.identifier().to_string()));
    }
    Ok(())
}

/// Minimal view of a containment parent.
struct Parent {
    id: String,
    resource_type: String,
    lies_within: Option<String>,
    recorded_in: Option<String>,
    in_batch: bool,
}

impl Parent {
    fn from_document(document: &Document, in_batch: bool) -> Self {
        Self {
            id: document.id_str().to_string(),
            resource_type: document.resource_type().to_string(),
            lies_within: document.resource.lies_within().map(str::to_string),
            recorded_in: document.resource.recorded_in().map(str::to_string),
            in_batch,
        }
    }
}

struct Resolver<'a, S: ?Sized, P: ?Sized> {
    batch: &'a BTreeMap<String, Document>,
    store: &'a S,
    schema: &'a P,
    options: &'a ImportOptions,
}

impl<S, P> Resolver<'_, S, P>
where
    S: DocumentStore + ?Sized,
    P: SchemaProvider + ?Sized,
{
    /// The operation `candidate` belongs to after resolution.
    async fn resolve(&self, candidate: &Candidate) -> Result<Option<String>> {
        let document = &candidate.document;
        let identifier = document.identifier();
        let parent = match document.resource.lies_within() {
            Some(target) => Some(self.parent(target).await?),
            None => None,
        };

        if let Some(parent) = &parent {
            if !self.schema.is_allowed_relation_domain(
                document.resource_type(),
                &parent.resource_type,
                relation::LIES_WITHIN,
            ) {
                return Err(ImportError::TargetTypeRangeMismatch {
                    identifier: identifier.to_string(),
                    relation: relation::LIES_WITHIN.to_string(),
                    target_type: parent.resource_type.clone(),
                });
            }
        }

        if self.schema.is_operation_type(document.resource_type()) {
            if let Some(parent) = &parent {
                if self.schema.is_operation_type(&parent.resource_type) {
                    return Err(ImportError::ParentAssignmentToOperationsNotAllowed(
                        identifier.to_string(),
                    ));
                }
            }
            return Ok(None);
        }

        let expected = self.expected_operation(candidate);
        let computed = match parent {
            Some(parent) => self.operation_of(document, parent).await?,
            None => None,
        };

        match (computed, expected) {
            (Some(computed), Some(expected)) if computed != expected => Err(
                ImportError::OperationAssignmentMismatch(identifier.to_string()),
            ),
            (computed, expected) => Ok(computed.or(expected)),
        }
    }

    /// An explicitly authored `recordedIn` (overwrite only) or the batch
    /// operation.
    ///
    /// The merged document inherits the stored `recordedIn`, so a value equal
    /// to it is indistinguishable from an omitted one and never pins the
    /// operation: a `liesWithin` move then recomputes it.
    fn expected_operation(&self, candidate: &Candidate) -> Option<String> {
        if self.options.may_overwrite_relations() {
            if let Some(previous) = &candidate.previous {
                let authored = candidate.document.resource.relations.targets(relation::RECORDED_IN);
                if !authored.is_empty()
                    && authored != previous.resource.relations.targets(relation::RECORDED_IN)
                {
                    return authored.first().cloned();
                }
            }
        }
        self.options.operation_id.clone()
    }

    /// Walk `liesWithin` upwards from `parent` until an operation or a
    /// persisted resource answers.
    async fn operation_of(&self, source: &Document, mut parent: Parent) -> Result<Option<String>> {
        let mut visited = BTreeSet::from([source.id_str().to_string()]);
        loop {
            if !visited.insert(parent.id.clone()) {
                return Err(ImportError::LiesWithinCycle(source.identifier().to_string()));
            }
            if self.schema.is_operation_type(&parent.resource_type) {
                return Ok(Some(parent.id));
            }
            if !parent.in_batch {
                return Ok(parent.recorded_in);
            }
            match parent.lies_within.take() {
                Some(next) => parent = self.parent(&next).await?,
                None => {
                    return Ok(parent
                        .recorded_in
                        .or_else(|| self.options.operation_id.clone()))
                }
            }
        }
    }

    async fn parent(&self, id: &str) -> Result<Parent> {
        if let Some(document) = self.batch.get(id) {
            return Ok(Parent::from_document(document, true));
        }
        match self.store.get(id).await {
            Ok(document) => Ok(Parent::from_document(&document, false)),
            Err(StorageError::NotFound { .. }) => {
                Err(ImportError::MissingRelationTarget(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
