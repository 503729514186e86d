//! Schema inputs and loading.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::schema::{
    compiler::{compile_cached_json, compile_edmx, compile_tree},
    errors::SchemaError,
    model::ServiceMetadata,
    xml::XmlElement,
};

/// Where a schema comes from.
#[derive(Clone, Debug)]
pub enum SchemaSource {
    /// File on disk; `.json` files hold the cached form, anything else is EDMX.
    Path(PathBuf),
    /// EDMX text.
    Xml(String),
    /// Cached JSON text.
    Json(String),
    /// Already-parsed EDMX tree.
    Tree(XmlElement),
    /// Pre-built model, used as is.
    Metadata(ServiceMetadata),
}

impl SchemaSource {
    /// Source for a file path.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        SchemaSource::Path(path.into())
    }

    /// Loads every schema the source declares.
    pub fn load(self) -> Result<Vec<ServiceMetadata>, SchemaError> {
        match self {
            SchemaSource::Path(path) => load_path(&path),
            SchemaSource::Xml(text) => compile_edmx(&text),
            SchemaSource::Json(text) => compile_cached_json(&text),
            SchemaSource::Tree(root) => compile_tree(&root),
            SchemaSource::Metadata(mut meta) => {
                meta.reindex();
                Ok(vec![meta])
            }
        }
    }

    /// Loads the source and keeps its first schema.
    pub fn load_first(self) -> Result<ServiceMetadata, SchemaError> {
        self.load()?.into_iter().next().ok_or(SchemaError::NoSchema)
    }
}

fn load_path(path: &Path) -> Result<Vec<ServiceMetadata>, SchemaError> {
    let text = fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    debug!(path = %path.display(), json = is_json, "loading schema file");
    if is_json {
        compile_cached_json(&text)
    } else {
        compile_edmx(&text)
    }
}

impl From<ServiceMetadata> for SchemaSource {
    fn from(meta: ServiceMetadata) -> Self {
        SchemaSource::Metadata(meta)
    }
}

impl From<XmlElement> for SchemaSource {
    fn from(root: XmlElement) -> Self {
        SchemaSource::Tree(root)
    }
}
