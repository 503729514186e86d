//! OData v4 query compilation and validation.
//!
//! Queries are built as [`query::QuerySpec`] trees, checked against the
//! target's capability and a compiled service schema, and rendered into
//! query-string text. [`ODataClient`] bundles those steps behind one schema.

#![warn(missing_docs)]

pub mod client;
pub mod config;
mod error;
pub mod query;
pub mod schema;

pub use client::{ClientQuery, ODataClient};
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use query::{Expr, Literal, QueryBuilder, QueryError, QuerySpec, Target};
pub use schema::{SchemaError, SchemaSource, ServiceMetadata};
