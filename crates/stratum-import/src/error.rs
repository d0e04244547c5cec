//! Import error taxonomy.
//!
//! Every error is fatal to the whole batch. Errors leave the core as
//! [`ErrorTuple`]s (`[kind, ...context]`) so callers can format localized
//! messages without depending on this crate's types.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use stratum_store::StorageError;

/// Stable error kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // structural / schema
    MalformedDocument,
    UnknownType,
    TypeNotAllowed,
    TypeCannotBeChanged,
    OperationsNotAllowed,
    InvalidFields,
    InvalidRelations,
    IncompleteDropdownRange,
    // values
    MissingProperty,
    MustNotBeEmptyString,
    InvalidNumericValues,
    InvalidDatingValues,
    InvalidDimensionValues,
    InvalidGeometry,
    MissingCoordinates,
    InvalidCoordinates,
    UnsupportedGeometryType,
    // identity
    DuplicateIdentifier,
    ResourceExists,
    UpdateTargetNotFound,
    // relations
    MissingRelationTarget,
    EmptyRelation,
    BadInterrelation,
    MustBeArray,
    ParentMustNotBeArray,
    ForbiddenRelation,
    TargetTypeRangeMismatch,
    MustBeInSameOperation,
    OperationAssignmentMismatch,
    ParentAssignmentToOperationsNotAllowed,
    NoOperationAssigned,
    LiesWithinCycle,
    // store
    Storage,
    RollbackFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedDocument => "MALFORMED_DOCUMENT",
            ErrorKind::UnknownType => "UNKNOWN_TYPE",
            ErrorKind::TypeNotAllowed => "TYPE_NOT_ALLOWED",
            ErrorKind::TypeCannotBeChanged => "TYPE_CANNOT_BE_CHANGED",
            ErrorKind::OperationsNotAllowed => "OPERATIONS_NOT_ALLOWED",
            ErrorKind::InvalidFields => "INVALID_FIELDS",
            ErrorKind::InvalidRelations => "INVALID_RELATIONS",
            ErrorKind::IncompleteDropdownRange => "INCOMPLETE_DROPDOWN_RANGE",
            ErrorKind::MissingProperty => "MISSING_PROPERTY",
            ErrorKind::MustNotBeEmptyString => "MUST_NOT_BE_EMPTY_STRING",
            ErrorKind::InvalidNumericValues => "INVALID_NUMERIC_VALUES",
            ErrorKind::InvalidDatingValues => "INVALID_DATING_VALUES",
            ErrorKind::InvalidDimensionValues => "INVALID_DIMENSION_VALUES",
            ErrorKind::InvalidGeometry => "INVALID_GEOMETRY",
            ErrorKind::MissingCoordinates => "MISSING_COORDINATES",
            ErrorKind::InvalidCoordinates => "INVALID_COORDINATES",
            ErrorKind::UnsupportedGeometryType => "UNSUPPORTED_GEOMETRY_TYPE",
            ErrorKind::DuplicateIdentifier => "DUPLICATE_IDENTIFIER",
            ErrorKind::ResourceExists => "RESOURCE_EXISTS",
            ErrorKind::UpdateTargetNotFound => "UPDATE_TARGET_NOT_FOUND",
            ErrorKind::MissingRelationTarget => "MISSING_RELATION_TARGET",
            ErrorKind::EmptyRelation => "EMPTY_RELATION",
            ErrorKind::BadInterrelation => "BAD_INTERRELATION",
            ErrorKind::MustBeArray => "MUST_BE_ARRAY",
            ErrorKind::ParentMustNotBeArray => "PARENT_MUST_NOT_BE_ARRAY",
            ErrorKind::ForbiddenRelation => "FORBIDDEN_RELATION",
            ErrorKind::TargetTypeRangeMismatch => "TARGET_TYPE_RANGE_MISMATCH",
            ErrorKind::MustBeInSameOperation => "MUST_BE_IN_SAME_OPERATION",
            ErrorKind::OperationAssignmentMismatch => "OPERATION_ASSIGNMENT_MISMATCH",
            ErrorKind::ParentAssignmentToOperationsNotAllowed => {
                "PARENT_ASSIGNMENT_TO_OPERATIONS_NOT_ALLOWED"
            }
            ErrorKind::NoOperationAssigned => "NO_OPERATION_ASSIGNED",
            ErrorKind::LiesWithinCycle => "LIES_WITHIN_CYCLE",
            ErrorKind::Storage => "STORAGE",
            ErrorKind::RollbackFailed => "ROLLBACK_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[kind, ...params]`, the shape handed to message formatters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTuple {
    pub kind: ErrorKind,
    pub params: Vec<String>,
}

impl ErrorTuple {
    pub fn new(kind: ErrorKind, params: Vec<String>) -> Self {
        Self { kind, params }
    }
}

impl Serialize for ErrorTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.params.len() + 1))?;
        seq.serialize_element(self.kind.as_str())?;
        for param in &self.params {
            seq.serialize_element(param)?;
        }
        seq.end()
    }
}

/// Join offending field or relation names into one context parameter.
///
/// A single name stays as is, several names become a comma-separated list,
/// so formatters can pick singular or plural wording.
pub fn join_names(names: &[String]) -> String {
    names.join(", ")
}

/// Errors produced by the import pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("type not allowed for import: {0}")]
    TypeNotAllowed(String),

    #[error("type of {identifier} cannot be changed from {from} to {to}")]
    TypeCannotBeChanged {
        identifier: String,
        from: String,
        to: String,
    },

    #[error("operations cannot be imported into an operation: {0}")]
    OperationsNotAllowed(String),

    #[error("unconfigured fields for type {resource_type}: {}", join_names(.fields))]
    InvalidFields {
        resource_type: String,
        fields: Vec<String>,
    },

    #[error("unconfigured relations for type {resource_type}: {}", join_names(.relations))]
    InvalidRelations {
        resource_type: String,
        relations: Vec<String>,
    },

    #[error("incomplete dropdown range on type {resource_type}: {field}")]
    IncompleteDropdownRange {
        resource_type: String,
        field: String,
    },

    #[error("missing mandatory property on type {resource_type}: {}", join_names(.fields))]
    MissingProperty {
        resource_type: String,
        fields: Vec<String>,
    },

    #[error("field {field} of {identifier} must not be an empty string")]
    MustNotBeEmptyString { identifier: String, field: String },

    #[error("invalid numeric values on type {resource_type}: {}", join_names(.fields))]
    InvalidNumericValues {
        resource_type: String,
        fields: Vec<String>,
    },

    #[error("invalid dating values on type {resource_type}: {}", join_names(.fields))]
    InvalidDatingValues {
        resource_type: String,
        fields: Vec<String>,
    },

    #[error("invalid dimension values on type {resource_type}: {}", join_names(.fields))]
    InvalidDimensionValues {
        resource_type: String,
        fields: Vec<String>,
    },

    #[error("invalid geometry on {0}")]
    InvalidGeometry(String),

    #[error("geometry of {0} has no coordinates")]
    MissingCoordinates(String),

    #[error("invalid coordinates for geometry type {0}")]
    InvalidCoordinates(String),

    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometryType(String),

    #[error("duplicate identifier in batch: {0}")]
    DuplicateIdentifier(String),

    #[error("resource already exists: {0}")]
    ResourceExists(String),

    #[error("update target not found: {0}")]
    UpdateTargetNotFound(String),

    #[error("missing relation target: {0}")]
    MissingRelationTarget(String),

    #[error("empty relation on {0}")]
    EmptyRelation(String),

    #[error("relation and inverse relation contradict each other on {0}")]
    BadInterrelation(String),

    #[error("relation values of {0} must be arrays")]
    MustBeArray(String),

    #[error("parent of {0} must be a single value")]
    ParentMustNotBeArray(String),

    #[error("relation {relation} on {identifier} cannot be set directly")]
    ForbiddenRelation { identifier: String, relation: String },

    #[error("relation {relation} of {identifier} cannot point to type {target_type}")]
    TargetTypeRangeMismatch {
        identifier: String,
        relation: String,
        target_type: String,
    },

    #[error("{source_identifier} and {target_identifier} must be recorded in the same operation")]
    MustBeInSameOperation {
        source_identifier: String,
        target_identifier: String,
    },

    #[error("operation assignment of {0} contradicts its containment")]
    OperationAssignmentMismatch(String),

    #[error("operation {0} cannot lie within another operation")]
    ParentAssignmentToOperationsNotAllowed(String),

    #[error("no operation assigned to {0}")]
    NoOperationAssigned(String),

    #[error("containment of {0} is cyclic")]
    LiesWithinCycle(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("rollback failed: {0}")]
    RollbackFailed(String),
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::MalformedDocument(_) => ErrorKind::MalformedDocument,
            ImportError::UnknownType(_) => ErrorKind::UnknownType,
            ImportError::TypeNotAllowed(_) => ErrorKind::TypeNotAllowed,
            ImportError::TypeCannotBeChanged { .. } => ErrorKind::TypeCannotBeChanged,
            ImportError::OperationsNotAllowed(_) => ErrorKind::OperationsNotAllowed,
            ImportError::InvalidFields { .. } => ErrorKind::InvalidFields,
            ImportError::InvalidRelations { .. } => ErrorKind::InvalidRelations,
            ImportError::IncompleteDropdownRange { .. } => ErrorKind::IncompleteDropdownRange,
            ImportError::MissingProperty { .. } => ErrorKind::MissingProperty,
            ImportError::MustNotBeEmptyString { .. } => ErrorKind::MustNotBeEmptyString,
            ImportError::InvalidNumericValues { .. } => ErrorKind::InvalidNumericValues,
            ImportError::InvalidDatingValues { .. } => ErrorKind::InvalidDatingValues,
            ImportError::InvalidDimensionValues { .. } => ErrorKind::InvalidDimensionValues,
            ImportError::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            ImportError::MissingCoordinates(_) => ErrorKind::MissingCoordinates,
            ImportError::InvalidCoordinates(_) => ErrorKind::InvalidCoordinates,
            ImportError::UnsupportedGeometryType(_) => ErrorKind::UnsupportedGeometryType,
            ImportError::DuplicateIdentifier(_) => ErrorKind::DuplicateIdentifier,
            ImportError::ResourceExists(_) => ErrorKind::ResourceExists,
            ImportError::UpdateTargetNotFound(_) => ErrorKind::UpdateTargetNotFound,
            ImportError::MissingRelationTarget(_) => ErrorKind::MissingRelationTarget,
            ImportError::EmptyRelation(_) => ErrorKind::EmptyRelation,
            ImportError::BadInterrelation(_) => ErrorKind::BadInterrelation,
            ImportError::MustBeArray(_) => ErrorKind::MustBeArray,
            ImportError::ParentMustNotBeArray(_) => ErrorKind::ParentMustNotBeArray,
            ImportError::ForbiddenRelation { .. } => ErrorKind::ForbiddenRelation,
            ImportError::TargetTypeRangeMismatch { .. } => ErrorKind::TargetTypeRangeMismatch,
            ImportError::MustBeInSameOperation { .. } => ErrorKind::MustBeInSameOperation,
            ImportError::OperationAssignmentMismatch(_) => ErrorKind::OperationAssignmentMismatch,
            ImportError::ParentAssignmentToOperationsNotAllowed(_) => {
                ErrorKind::ParentAssignmentToOperationsNotAllowed
            }
            ImportError::NoOperationAssigned(_) => ErrorKind::NoOperationAssigned,
            ImportError::LiesWithinCycle(_) => ErrorKind::LiesWithinCycle,
            ImportError::Storage(_) => ErrorKind::Storage,
            ImportError::RollbackFailed(_) => ErrorKind::RollbackFailed,
        }
    }

    /// Ordered context parameters for message formatting.
    pub fn params(&self) -> Vec<String> {
        match self {
            ImportError::MalformedDocument(p)
            | ImportError::UnknownType(p)
            | ImportError::TypeNotAllowed(p)
            | ImportError::OperationsNotAllowed(p)
            | ImportError::InvalidGeometry(p)
            | ImportError::MissingCoordinates(p)
            | ImportError::InvalidCoordinates(p)
            | ImportError::UnsupportedGeometryType(p)
            | ImportError::DuplicateIdentifier(p)
            | ImportError::ResourceExists(p)
            | ImportError::UpdateTargetNotFound(p)
            | ImportError::MissingRelationTarget(p)
            | ImportError::EmptyRelation(p)
            | ImportError::BadInterrelation(p)
            | ImportError::MustBeArray(p)
            | ImportError::ParentMustNotBeArray(p)
            | ImportError::OperationAssignmentMismatch(p)
            | ImportError::ParentAssignmentToOperationsNotAllowed(p)
            | ImportError::NoOperationAssigned(p)
            | ImportError::LiesWithinCycle(p)
            | ImportError::RollbackFailed(p) => vec![p.clone()],
            ImportError::TypeCannotBeChanged {
                identifier,
                from,
                to,
            } => vec![identifier.clone(), from.clone(), to.clone()],
            ImportError::InvalidFields {
                resource_type,
                fields,
            }
            | ImportError::MissingProperty {
                resource_type,
                fields,
            }
            | ImportError::InvalidNumericValues {
                resource_type,
                fields,
            }
            | ImportError::InvalidDatingValues {
                resource_type,
                fields,
            }
            | ImportError::InvalidDimensionValues {
                resource_type,
                fields,
            } => vec![resource_type.clone(), join_names(fields)],
            ImportError::InvalidRelations {
                resource_type,
                relations,
            } => vec![resource_type.clone(), join_names(relations)],
            ImportError::IncompleteDropdownRange {
                resource_type,
                field,
            } => vec![resource_type.clone(), field.clone()],
            ImportError::MustNotBeEmptyString { identifier, field } => {
                vec![identifier.clone(), field.clone()]
            }
            ImportError::ForbiddenRelation {
                identifier,
                relation,
            } => vec![identifier.clone(), relation.clone()],
            ImportError::TargetTypeRangeMismatch {
                identifier,
                relation,
                target_type,
            } => vec![identifier.clone(), relation.clone(), target_type.clone()],
            ImportError::MustBeInSameOperation {
                source_identifier,
                target_identifier,
            } => vec![source_identifier.clone(), target_identifier.clone()],
            ImportError::Storage(err) => vec![err.to_string()],
        }
    }

    pub fn to_tuple(&self) -> ErrorTuple {
        ErrorTuple::new(self.kind(), self.params())
    }
}

impl From<&ImportError> for ErrorTuple {
    fn from(err: &ImportError) -> Self {
        err.to_tuple()
    }
}

/// Result type for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;
