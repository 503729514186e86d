use thiserror::Error;

use crate::config::ConfigError;
use crate::query::QueryError;
use crate::schema::SchemaError;

/// Crate-wide result.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Query construction, validation or compilation failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A schema could not be loaded.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Configuration could not be read or written.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Query(err) => err.code(),
            Error::Schema(err) => err.code(),
            Error::Config(_) => "Config",
        }
    }
}
