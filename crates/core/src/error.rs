use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything except `InvalidTree` is scoped to a single row, file, or partition and is
/// reported rather than allowed to stop the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("category '{0}' not found in category tree")]
    CategoryNotFound(String),
    #[error("malformed number: {value:?}")]
    MalformedNumber { value: String },
    #[error("missing input {}: {reason}", .path.display())]
    MissingInput { path: PathBuf, reason: String },
    #[error("row {line}: {reason}")]
    PartialRow { line: u64, reason: String },
    #[error("invalid category tree: {0}")]
    InvalidTree(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MissingInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Conditions that mean "nothing to do here", as opposed to a broken input.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::MissingInput { .. })
    }
}
