use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or write durable state.
///
/// A load failure is never turned into a default state: callers must be able
/// to tell "never seen" (`Ok(None)`) from "could not load" (`Err`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt state in {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("State serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
