//! Compensation for partially persisted create-mode batches.

use stratum_store::{Document, DocumentStore};
use tracing::debug;

use crate::error::ImportError;

/// What a rollback managed to undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub restored: usize,
    pub removed: usize,
    /// Ids of documents left as the batch wrote them, in rollback order.
    pub failed: Vec<String>,
}

impl RollbackOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// [`ImportError::RollbackFailed`] naming the first document that could
    /// not be undone.
    pub fn error(&self) -> Option<ImportError> {
        self.failed
            .first()
            .map(|id| ImportError::RollbackFailed(id.clone()))
    }

    pub fn survived(&self, document: &Document) -> bool {
        self.failed.iter().any(|id| id == document.id_str())
    }
}

/// Undo a batch's writes, newest first.
///
/// `rewritten` holds the original versions of persisted documents the batch
/// updated; they were written after every entry of `created`, so they are
/// restored before the created documents are removed. Every document is
/// attempted even after a failure.
pub async fn rollback<S>(store: &S, created: &[Document], rewritten: &[Document]) -> RollbackOutcome
where
    S: DocumentStore + ?Sized,
{
    let mut outcome = RollbackOutcome::default();
    for original in rewritten.iter().rev() {
        match store.restore(original).await {
            Ok(()) => {
                outcome.restored += 1;
                debug!(id = %original.id_str(), "restored");
            }
            Err(err) => {
                debug!(id = %original.id_str(), error = %err, "restore of document failed");
                outcome.failed.push(original.id_str().to_string());
            }
        }
    }
    for document in created.iter().rev() {
        match store.remove(document).await {
            Ok(()) => {
                outcome.removed += 1;
                debug!(id = %document.id_str(), "rolled back");
            }
            Err(err) => {
                debug!(id = %document.id_str(), error = %err, "rollback of document failed");
                outcome.failed.push(document.id_str().to_string());
            }
        }
    }
    outcome
}
