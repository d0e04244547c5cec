//! Batch import orchestration.
//!
//! Sequences the pipeline stages, persists the result and compensates
//! failed create-mode batches. Errors never escape [`Importer::import`];
//! they are reported as [`ErrorTuple`]s on the [`ImportReport`].

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stratum_store::{Document, DocumentStore, StorageError};
use tracing::Instrument;

use crate::error::{ErrorTuple, ImportError, Result};
use crate::hierarchy::resolve_hierarchy;
use crate::identity::{assert_unique, resolve_identities, Candidate, IdGenerator, UuidGenerator};
use crate::obs;
use crate::options::ImportOptions;
use crate::preprocess::{preprocess, raw_identifier};
use crate::relations::{complete_relations, RelationUpdate};
use crate::rollback::rollback;
use crate::schema::SchemaProvider;
use crate::validation::Validator;

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Validating,
    IdentityResolving,
    HierarchyResolving,
    RelationCompleting,
    Persisting,
    Done,
    Failed,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStage::Validating => "validating",
            ImportStage::IdentityResolving => "identity_resolving",
            ImportStage::HierarchyResolving => "hierarchy_resolving",
            ImportStage::RelationCompleting => "relation_completing",
            ImportStage::Persisting => "persisting",
            ImportStage::Done => "done",
            ImportStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub batch_id: String,
    pub created_count: usize,
    pub updated_count: usize,
    pub created_ids: Vec<String>,
    pub updated_ids: Vec<String>,
    /// Persisted documents rewritten to keep inverse relations consistent.
    pub relation_updates: Vec<Document>,
    pub errors: Vec<ErrorTuple>,
    /// `Done` or `Failed`.
    pub stage: ImportStage,
    /// Stage a failed batch stopped in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<ImportStage>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Mutable bookkeeping of a running batch.
#[derive(Debug)]
struct Progress {
    batch_id: String,
    stage: ImportStage,
    created: Vec<Document>,
    updated_ids: Vec<String>,
    relation_updates: Vec<Document>,
    /// Versions of `relation_updates` before this batch rewrote them.
    rewritten: Vec<Document>,
}

impl Progress {
    fn new(batch_id: String) -> Self {
        Self {
            batch_id,
            stage: ImportStage::Validating,
            created: Vec::new(),
            updated_ids: Vec::new(),
            relation_updates: Vec::new(),
            rewritten: Vec::new(),
        }
    }

    fn enter(&mut self, stage: ImportStage) {
        self.stage = stage;
        obs::emit_stage_entered(&self.batch_id, stage.as_str());
    }
}

/// Reject a batch naming the same identifier twice, before any record is
/// converted.
fn assert_unique_records(records: &[Value]) -> Result<()> {
    assert_unique(records.iter().filter_map(raw_identifier))
}

/// Preprocess and validate raw records without touching a store.
///
/// Duplicate identifiers are rejected before any per-document check.
pub fn validate_batch<P>(records: Vec<Value>, schema: &P, options: &ImportOptions) -> Result<Vec<Document>>
where
    P: SchemaProvider + ?Sized,
{
    assert_unique_records(&records)?;
    let documents = records
        .into_iter()
        .map(|raw| preprocess(raw, options))
        .collect::<Result<Vec<_>>>()?;

    let validator = Validator::new(schema);
    documents
        .into_iter()
        .map(|doc| validator.validate(doc, options))
        .collect()
}

/// Runs batches against one store and schema.
pub struct Importer<'a, S: ?Sized, P: ?Sized, G = UuidGenerator> {
    store: &'a S,
    schema: &'a P,
    ids: G,
    options: ImportOptions,
}

impl<'a, S, P> Importer<'a, S, P, UuidGenerator>
where
    S: DocumentStore + ?Sized,
    P: SchemaProvider + ?Sized,
{
    pub fn new(store: &'a S, schema: &'a P, options: ImportOptions) -> Self {
        Self {
            store,
            schema,
            ids: UuidGenerator,
            options,
        }
    }
}

impl<'a, S, P, G> Importer<'a, S, P, G>
where
    S: DocumentStore + ?Sized,
    P: SchemaProvider + ?Sized,
    G: IdGenerator,
{
    /// Replace the id source for created documents.
    pub fn with_id_generator<H: IdGenerator>(self, ids: H) -> Importer<'a, S, P, H> {
        Importer {
            store: self.store,
            schema: self.schema,
            ids,
            options: self.options,
        }
    }

    /// Import one batch all-or-nothing.
    pub async fn import(&self, records: Vec<Value>) -> ImportReport {
        let batch_id = uuid::Uuid::new_v4().to_string();
        let span = obs::import_span(&batch_id);
        self.import_batch(batch_id, records).instrument(span).await
    }

    async fn import_batch(&self, batch_id: String, records: Vec<Value>) -> ImportReport {
        let started = Instant::now();
        obs::emit_import_started(&batch_id, records.len(), self.options.merge_mode);

        let mut progress = Progress::new(batch_id);
        match self.run(records, &mut progress).await {
            Ok(()) => {
                progress.enter(ImportStage::Done);
                obs::emit_import_finished(
                    &progress.batch_id,
                    progress.created.len(),
                    progress.updated_ids.len(),
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                );
                let created_ids: Vec<String> = progress
                    .created
                    .iter()
                    .map(|d| d.id_str().to_string())
                    .collect();
                ImportReport {
                    batch_id: progress.batch_id,
                    created_count: created_ids.len(),
                    updated_count: progress.updated_ids.len(),
                    created_ids,
                    updated_ids: progress.updated_ids,
                    relation_updates: progress.relation_updates,
                    errors: Vec::new(),
                    stage: ImportStage::Done,
                    failed_at: None,
                }
            }
            Err(err) => self.fail(progress, err).await,
        }
    }

    async fn run(&self, records: Vec<Value>, progress: &mut Progress) -> Result<()> {
        progress.enter(ImportStage::Validating);
        assert_unique_records(&records)?;
        if let Some(operation_id) = &self.options.operation_id {
            self.assert_operation_exists(operation_id).await?;
        }
        let documents = validate_batch(records, self.schema, &self.options)?;

        progress.enter(ImportStage::IdentityResolving);
        let candidates = resolve_identities(documents, self.store, &self.ids, &self.options).await?;
        if self.options.merge_mode {
            let validator = Validator::new(self.schema);
            for candidate in &candidates {
                validator.validate_merged(&candidate.document)?;
            }
        }

        progress.enter(ImportStage::HierarchyResolving);
        let candidates = resolve_hierarchy(candidates, self.store, self.schema, &self.options).await?;

        progress.enter(ImportStage::RelationCompleting);
        let (candidates, relation_updates) = complete_relations(candidates, self.store, self.schema).await?;

        progress.enter(ImportStage::Persisting);
        self.persist(candidates, relation_updates, progress).await
    }

    async fn assert_operation_exists(&self, operation_id: &str) -> Result<()> {
        match self.store.get(operation_id).await {
            Ok(operation) if self.schema.is_operation_type(operation.resource_type()) => Ok(()),
            Ok(operation) => Err(ImportError::TargetTypeRangeMismatch {
                identifier: operation.identifier().to_string(),
                relation: stratum_store::relation::RECORDED_IN.to_string(),
                target_type: operation.resource_type().to_string(),
            }),
            Err(StorageError::NotFound { .. }) => {
                Err(ImportError::MissingRelationTarget(operation_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn persist(
        &self,
        candidates: Vec<Candidate>,
        relation_updates: Vec<RelationUpdate>,
        progress: &mut Progress,
    ) -> Result<()> {
        let user = self.options.user.as_str();
        for candidate in candidates {
            if candidate.is_update() {
                let stored = self.store.update(candidate.document, user).await?;
                obs::emit_document_persisted(&progress.batch_id, stored.id_str(), false);
                progress.updated_ids.push(stored.id_str().to_string());
            } else {
                let stored = self.store.create(candidate.document, user).await?;
                obs::emit_document_persisted(&progress.batch_id, stored.id_str(), true);
                progress.created.push(stored);
            }
        }
        for update in relation_updates {
            let stored = self.store.update(update.updated, user).await?;
            progress.relation_updates.push(stored);
            progress.rewritten.push(update.original);
        }
        Ok(())
    }

    async fn fail(&self, progress: Progress, err: ImportError) -> ImportReport {
        let failed_at = progress.stage;
        obs::emit_import_failed(&progress.batch_id, failed_at.as_str(), &err);

        let mut errors = vec![err.to_tuple()];
        let mut created_ids = Vec::new();
        let mut relation_updates = progress.relation_updates;
        let wrote = !progress.created.is_empty() || !progress.rewritten.is_empty();
        if !self.options.merge_mode && wrote {
            let outcome = rollback(self.store, &progress.created, &progress.rewritten).await;
            obs::emit_rollback(
                &progress.batch_id,
                outcome.removed,
                outcome.restored,
                outcome.is_complete(),
            );
            if let Some(rollback_err) = outcome.error() {
                errors.push(rollback_err.to_tuple());
            }
            created_ids = progress
                .created
                .iter()
                .filter(|d| outcome.survived(d))
                .map(|d| d.id_str().to_string())
                .collect();
            relation_updates.retain(|d| outcome.survived(d));
        }

        ImportReport {
            batch_id: progress.batch_id,
            created_count: created_ids.len(),
            updated_count: progress.updated_ids.len(),
            created_ids,
            updated_ids: progress.updated_ids,
            relation_updates,
            errors,
            stage: ImportStage::Failed,
            failed_at: Some(failed_at),
        }
    }
}
