use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize history record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{id}' is not a valid response id")]
    InvalidId { id: String },
}

impl HistoryError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialize {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no stored response matches '{candidate}'")]
    NotFound { candidate: String },

    #[error("'{candidate}' is not a valid response id")]
    InvalidId { candidate: String },

    #[error("'{candidate}' is ambiguous; it matches {}", matches.join(", "))]
    Ambiguous {
        candidate: String,
        matches: Vec<String>,
    },
}
