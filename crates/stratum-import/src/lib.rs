//! Stratum Import Core
//!
//! Ingests a batch of externally supplied records, validates them against a
//! runtime-configured project schema, resolves identifiers and containment,
//! completes inverse relations against the batch and the persisted store,
//! and applies the batch all-or-nothing.
//!
//! Pipeline: `Validating → IdentityResolving → HierarchyResolving →
//! RelationCompleting → Persisting → Done`, with `Failed` reachable from
//! every non-terminal stage.

pub mod error;
pub mod hierarchy;
pub mod identity;
pub mod merge;
pub mod obs;
pub mod options;
pub mod orchestrator;
pub mod preprocess;
pub mod relations;
pub mod rollback;
pub mod schema;
pub mod telemetry;
pub mod validation;

pub use error::{ErrorKind, ErrorTuple, ImportError, Result};
pub use identity::{Candidate, IdGenerator, UuidGenerator};
pub use options::{ImportOptions, UnmatchedMergePolicy};
pub use orchestrator::{validate_batch, ImportReport, ImportStage, Importer};
pub use schema::{
    FieldDefinition, InputType, ProjectSchema, RelationDefinition, SchemaProvider, TypeDefinition,
};
pub use telemetry::init_tracing;
