//! Error types for CSV operations.

use elr_map::MapperError;
use elr_model::{IssueDetail, ModelError};
use thiserror::Error;

/// Why CSV text could not be tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvParseFailure {
    /// A record has a different number of fields than the header.
    RaggedRow { row: u64 },
    /// Any other tokenizer failure (bad UTF-8, I/O).
    Parse { message: String },
}

impl From<CsvParseFailure> for IssueDetail {
    fn from(failure: CsvParseFailure) -> Self {
        match failure {
            CsvParseFailure::RaggedRow { row } => IssueDetail::RaggedRow { row },
            CsvParseFailure::Parse { message } => IssueDetail::CsvParse { message },
        }
    }
}

impl From<csv::Error> for CsvParseFailure {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::UnequalLengths { pos, .. } => CsvParseFailure::RaggedRow {
                row: pos.as_ref().map_or(0, csv::Position::line),
            },
            _ => CsvParseFailure::Parse {
                message: error.to_string(),
            },
        }
    }
}

/// Errors that abort a CSV operation.
///
/// Problems with the input data are reported through the read result instead.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Internal (canonical) CSV that cannot be tokenized.
    #[error("failed to parse internal CSV: {}", IssueDetail::from(.0.clone()))]
    InternalParse(CsvParseFailure),

    #[error("failed to write CSV: {0}")]
    Write(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

pub type Result<T> = std::result::Result<T, CsvError>;
