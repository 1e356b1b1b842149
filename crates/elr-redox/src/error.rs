//! Error types for nested JSON output.

use elr_model::ModelError;
use thiserror::Error;

/// Errors that abort a JSON write.
#[derive(Debug, Error)]
pub enum RedoxError {
    /// A JSON path bound to an element does not parse.
    #[error("invalid JSON path '{path}' on element '{element}': {reason}")]
    InvalidPath {
        path: String,
        element: String,
        reason: String,
    },

    /// A plan field points past the end of the schema being written.
    #[error("JSON plan for schema '{schema}' has no element {index}")]
    StalePlan { schema: String, index: usize },

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, RedoxError>;
