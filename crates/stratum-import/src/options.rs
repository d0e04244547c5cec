//! Per-batch import configuration.

use serde::{Deserialize, Serialize};

/// What merge mode does with candidates that match no persisted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedMergePolicy {
    /// Skip the candidate; it is neither created nor updated.
    #[default]
    Drop,
    /// Fail the batch with `UPDATE_TARGET_NOT_FOUND`.
    Reject,
}

/// Options controlling one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Update existing resources matched by identifier instead of creating.
    pub merge_mode: bool,
    /// In merge mode: let candidate relations replace persisted ones and
    /// `null` values delete fields.
    pub permit_deletions: bool,
    /// Import every resource into this operation.
    pub operation_id: Option<String>,
    /// Relation targets are identifiers rather than ids.
    pub use_identifiers_in_relations: bool,
    pub unmatched_merge_policy: UnmatchedMergePolicy,
    /// User recorded on created/modified stamps.
    pub user: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            merge_mode: false,
            permit_deletions: false,
            operation_id: None,
            use_identifiers_in_relations: false,
            unmatched_merge_policy: UnmatchedMergePolicy::Drop,
            user: "anonymous".to_string(),
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(mut self) -> Self {
        self.merge_mode = true;
        self
    }

    pub fn permit_deletions(mut self) -> Self {
        self.permit_deletions = true;
        self
    }

    pub fn into_operation(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn with_identifiers(mut self) -> Self {
        self.use_identifiers_in_relations = true;
        self
    }

    pub fn reject_unmatched(mut self) -> Self {
        self.unmatched_merge_policy = UnmatchedMergePolicy::Reject;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Whether the caller may author `recordedIn`/`liesWithin`/`includes`
    /// directly and overwrite persisted relations.
    pub fn may_overwrite_relations(&self) -> bool {
        self.merge_mode && self.permit_deletions
    }
}
