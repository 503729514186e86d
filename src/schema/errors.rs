#![allow(missing_docs)]

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to load a schema source. Always fatal for the load.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The source file could not be read.
    #[error("failed to read schema {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The XML text is malformed.
    #[error("malformed EDMX: {0}")]
    Xml(#[from] quick_xml::Error),
    /// The cached JSON text is malformed or does not match the schema shape.
    #[error("malformed cached schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A required child element is absent.
    #[error("<{parent}> is missing required element <{element}>")]
    MissingElement {
        parent: String,
        element: &'static str,
    },
    /// A required attribute is absent.
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    /// The document parsed but is not a schema description.
    #[error("invalid schema shape: {reason}")]
    InvalidShape { reason: String },
    /// The source declares no schema at all.
    #[error("schema source declares no <Schema>")]
    NoSchema,
}

impl SchemaError {
    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        SchemaError::InvalidShape {
            reason: reason.into(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::Read { .. } => "SchemaRead",
            SchemaError::Xml(_) => "SchemaXml",
            SchemaError::Json(_) => "SchemaJson",
            SchemaError::MissingElement { .. } => "SchemaMissingElement",
            SchemaError::MissingAttribute { .. } => "SchemaMissingAttribute",
            SchemaError::InvalidShape { .. } => "SchemaInvalidShape",
            SchemaError::NoSchema => "SchemaNoSchema",
        }
    }
}

/// Non-fatal inconsistency found while compiling a schema.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaWarning {
    /// An entity declares more than one key property; only the first is kept.
    CompositeKey { entity: String, kept: String, ignored: Vec<String> },
    /// A navigation declares more than one referential constraint; only the first is kept.
    MultipleConstraints { entity: String, navigation: String },
    /// An entity type was bound to a second entity set; the later binding wins.
    EntitySetRebound {
        entity: String,
        previous: String,
        current: String,
    },
    /// An entity set names an entity type the schema does not declare.
    UnknownSetType { entity_set: String, entity_type: String },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::CompositeKey {
                entity,
                kept,
                ignored,
            } => write!(
                f,
                "entity '{entity}' declares {} key properties; using '{kept}'",
                ignored.len() + 1
            ),
            SchemaWarning::MultipleConstraints { entity, navigation } => write!(
                f,
                "navigation '{entity}.{navigation}' has several referential constraints; using the first"
            ),
            SchemaWarning::EntitySetRebound {
                entity,
                previous,
                current,
            } => write!(
                f,
                "entity '{entity}' was bound to set '{previous}' and is now bound to '{current}'"
            ),
            SchemaWarning::UnknownSetType {
                entity_set,
                entity_type,
            } => write!(
                f,
                "entity set '{entity_set}' references undeclared entity type '{entity_type}'"
            ),
        }
    }
}
