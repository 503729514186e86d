#![forbid(unsafe_code)]

//! Service schema: model, compiler and loading.
//!
//! A schema is compiled once from EDMX (or its cached JSON form) and shared
//! read-only by every query validated against it.

/// Schema compiler for EDMX and cached JSON.
pub mod compiler;
/// EDM primitive families and type parsing.
pub mod edm;
/// Schema load errors and non-fatal warnings.
pub mod errors;
/// Schema model types.
pub mod model;
/// Ordered name-resolution strategies.
pub mod resolve;
/// Schema inputs.
pub mod source;
/// Owned XML element tree.
pub mod xml;

pub use compiler::{compile_cached_json, compile_edmx, compile_tree, to_cached_json};
pub use edm::{TypeElement, TypeRef};
pub use errors::{SchemaError, SchemaWarning};
pub use model::{
    Attribute, ComplexTypeDef, Entity, EnumDef, FunctionDef, FunctionParam, NavigationProperty,
    ServiceMetadata,
};
pub use source::SchemaSource;
pub use xml::XmlElement;
