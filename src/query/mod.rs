#![forbid(unsafe_code)]

//! Query model, validation and wire compilation.
//!
//! A query flows through four stages: it is built into a [`QuerySpec`], gated
//! against its target's capability, validated against a schema, and compiled
//! into query-string text.

/// Filter expression tree.
///
/// Defines the predicate nodes and the position-based operand coercion.
pub mod ast;

/// Wire compiler.
///
/// Renders validated queries into OData query-string text.
pub mod compile;

/// Query error taxonomy.
pub mod errors;

/// Caller input flattening for filters, field lists and ordering.
pub mod normalize;

/// Query tree and its fluent builder.
pub mod spec;

/// Endpoint shapes and the facets each permits.
pub mod target;

/// Schema validation producing a rewritten query tree.
pub mod validate;

/// Scalar literal values.
pub mod value;

pub use ast::{CompareOp, Expr, Operand, TextOp, L, P};
pub use compile::{compile, compile_expr, MembershipStyle, RenderOptions};
pub use errors::{QueryError, QueryErrorWithCode};
pub use normalize::Input;
pub use spec::{OrderByItem, QueryBuilder, QuerySpec};
pub use target::{gate, Capability, QueryPart, Target};
pub use validate::{validate, validate_with, ValidateOptions};
pub use value::Literal;
