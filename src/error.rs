//! Error taxonomy shared by the inference engine
//!
//! Per-job failures (`NotFound`, `MalformedSpec`, `Record`, `Io`) are caught at
//! the corpus boundary and tallied. `InvalidArgument`, `Serialize` and
//! `WorkerPanicked` always reach the caller.
//! Unresolved tokens and duplicate tags/executables are not errors at all.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by record loading, node-spec decoding, indexing and ranking
#[derive(Error, Debug)]
pub enum StatError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed node spec '{spec}': expected at most 3 fields, found {parts}")]
    MalformedSpec { spec: String, parts: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unreadable job record {}: {message}", path.display())]
    Record { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("corpus scan worker panicked")]
    WorkerPanicked,
}

impl StatError {
    pub(crate) fn not_found(path: impl AsRef<Path>) -> Self {
        StatError::NotFound {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Result type for the inference engine
pub type Result<T> = std::result::Result<T, StatError>;
