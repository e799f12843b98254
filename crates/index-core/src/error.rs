use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by index lookups, decoding, and persistence.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no artifact named '{name}' in the index")]
    UnknownName { name: String },

    #[error("no version of '{name}' satisfies '{constraint}'")]
    NoMatchingVersion { name: String, constraint: String },

    #[error("invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error("index JSON is not valid")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode index")]
    Encode(#[source] serde_json::Error),

    #[error("index I/O failed for {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
