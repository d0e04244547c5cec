//! Structured observability hooks for import lifecycle events.
//!
//! Every batch runs inside an `import` span tagged with its batch id.
//! Lifecycle events are emitted at `info!` level with an `event` field,
//! failures and rollbacks at `warn!`.

use tracing::{info, warn};

/// Span covering one batch.
///
/// [`crate::Importer::import`] instruments its own future with this span;
/// synchronous callers can enter it directly:
///
/// ```ignore
/// let _guard = import_span("batch-1").entered();
/// ```
pub fn import_span(batch_id: &str) -> tracing::Span {
    tracing::info_span!("stratum.import", batch_id = %batch_id)
}

pub fn emit_import_started(batch_id: &str, documents: usize, merge_mode: bool) {
    info!(
        event = "import.started",
        batch_id = %batch_id,
        documents = documents,
        merge_mode = merge_mode,
    );
}

/// Emit event: the pipeline entered `stage`.
pub fn emit_stage_entered(batch_id: &str, stage: &str) {
    info!(event = "import.stage", batch_id = %batch_id, stage = %stage);
}

pub fn emit_document_persisted(batch_id: &str, id: &str, created: bool) {
    info!(
        event = "import.document_persisted",
        batch_id = %batch_id,
        id = %id,
        created = created,
    );
}

/// Emit event: batch finished with its counts.
pub fn emit_import_finished(batch_id: &str, created: usize, updated: usize, duration_ms: u64) {
    info!(
        event = "import.finished",
        batch_id = %batch_id,
        created = created,
        updated = updated,
        duration_ms = duration_ms,
    );
}

pub fn emit_import_failed(batch_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "import.failed", batch_id = %batch_id, stage = %stage, error = %error);
}

/// Emit event: a failed batch's writes were undone.
pub fn emit_rollback(batch_id: &str, removed: usize, restored: usize, success: bool) {
    warn!(
        event = "import.rollback",
        batch_id = %batch_id,
        removed = removed,
        restored = restored,
        success = success,
    );
}
