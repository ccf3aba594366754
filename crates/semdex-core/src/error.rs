use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Document source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate document identifier '{0}' in one load")]
    DuplicateDocument(String),

    #[error("Embedding provider did not answer within {0:?}")]
    ProviderTimeout(Duration),

    #[error("Embedding provider failed: {0}")]
    ProviderFailure(String),

    #[error("Dimension mismatch for '{id}': expected {expected}, got {actual}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Corrupt cache entry for '{id}': {reason}")]
    CorruptEntry { id: String, reason: String },

    #[error("Vector index is empty")]
    EmptyIndex,

    #[error("Index has not been built")]
    IndexNotBuilt,

    #[error("Documents have not been loaded")]
    NotLoaded,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("An index build is already in progress")]
    Busy,

    #[error("Embedding cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Wrap any storage-layer failure (LanceDB, Arrow) as a cache error.
    pub fn cache(err: impl std::fmt::Display) -> Self {
        Error::Cache(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
