#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::query::target::QueryPart;

/// Joins facet names for capability errors (`$filter, $top`).
fn join_parts(parts: &[QueryPart]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Structured errors emitted while building, gating, validating, or
/// compiling a query.
///
/// Every variant is fatal for the query it was raised on; nothing is retried
/// or partially applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query has no target.
    #[error("no target specified; build the query from a collection, function, or endpoint")]
    MissingTarget,
    /// Validation was requested for a target that needs metadata, but none was supplied.
    #[error("validating {target} requires service metadata")]
    MetadataRequired { target: String },
    /// Target fields are inconsistent (focus without id, bad GUID, ...).
    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },
    /// One or more facets are not permitted for the target.
    #[error("{target} does not allow {}", join_parts(.parts))]
    CapabilityViolation {
        target: String,
        parts: Vec<QueryPart>,
    },
    /// Entity set or entity type name is absent from the schema.
    #[error("unknown entity or entity set '{name}'")]
    UnknownEntity { name: String },
    /// Attribute is absent from the entity.
    #[error("unknown attribute '{attribute}' in {context} on '{entity}'")]
    UnknownAttribute {
        entity: String,
        attribute: String,
        context: &'static str,
    },
    /// Navigation property is absent from the entity, or its target cannot be addressed.
    #[error("unknown navigation property '{navigation}' on '{entity}'")]
    UnknownNavigationProperty { entity: String, navigation: String },
    /// Literal does not name or match any member of the enum.
    #[error("'{value}' is not a member of enum '{enum_type}'")]
    UnknownEnumMember { enum_type: String, value: String },
    /// Function is absent from the schema.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    /// Function call passes a parameter the function does not declare.
    #[error("function '{function}' has no parameter '{parameter}'")]
    UnknownParameter { function: String, parameter: String },
    /// Function call omits a required parameter.
    #[error("function '{function}' requires parameter '{parameter}'")]
    MissingParameter { function: String, parameter: String },
    /// Literal kind disagrees with the attribute's type.
    #[error("'{attribute}' expects {expected}, got {found}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },
    /// Expression shape is not valid where it appears.
    #[error("malformed expression: {reason}")]
    MalformedExpression { reason: String },
    /// Literal value has no OData wire form.
    #[error("{kind} literal cannot be rendered: {reason}")]
    InvalidLiteral { kind: &'static str, reason: String },
    /// Skip or top is negative or exceeds the configured limit.
    #[error("{part} {reason}")]
    Bounds { part: QueryPart, reason: String },
    /// Builder input has the wrong shape.
    #[error("{context} expected {expected}, got {found}")]
    InvalidInput {
        context: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    /// Orderby input could not be parsed.
    #[error("invalid orderby {input:?}: {reason}")]
    InvalidOrderBy { input: String, reason: &'static str },
}

impl QueryError {
    /// Builds a [`QueryError::MalformedExpression`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        QueryError::MalformedExpression {
            reason: reason.into(),
        }
    }

    /// Builds a [`QueryError::TypeMismatch`].
    pub fn mismatch(
        attribute: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        QueryError::TypeMismatch {
            attribute: attribute.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::MissingTarget => "MissingTarget",
            QueryError::MetadataRequired { .. } => "MetadataRequired",
            QueryError::InvalidTarget { .. } => "InvalidTarget",
            QueryError::CapabilityViolation { .. } => "CapabilityViolation",
            QueryError::UnknownEntity { .. } => "UnknownEntity",
            QueryError::UnknownAttribute { .. } => "UnknownAttribute",
            QueryError::UnknownNavigationProperty { .. } => "UnknownNavigationProperty",
            QueryError::UnknownEnumMember { .. } => "UnknownEnumMember",
            QueryError::UnknownFunction { .. } => "UnknownFunction",
            QueryError::UnknownParameter { .. } => "UnknownParameter",
            QueryError::MissingParameter { .. } => "MissingParameter",
            QueryError::TypeMismatch { .. } => "TypeMismatch",
            QueryError::MalformedExpression { .. } => "MalformedExpression",
            QueryError::InvalidLiteral { .. } => "InvalidLiteral",
            QueryError::Bounds { .. } => "Bounds",
            QueryError::InvalidInput { .. } => "InvalidInput",
            QueryError::InvalidOrderBy { .. } => "InvalidOrderBy",
        }
    }
}

/// Convenience wrapper that formats query errors with their codes.
pub struct QueryErrorWithCode<'a>(pub &'a QueryError);

impl fmt::Display for QueryErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
