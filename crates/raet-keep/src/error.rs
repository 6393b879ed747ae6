use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the keep store.
#[derive(Debug, Error)]
pub enum KeepError {
    #[error("path '{0}' contains whitespace")]
    InvalidPath(PathBuf),

    #[error("record failed schema verification for '{0}'")]
    SchemaMismatch(String),

    #[error("io error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KeepError>;
