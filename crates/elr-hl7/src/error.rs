//! Error types for HL7 operations.

use elr_map::MapperError;
use elr_model::ModelError;
use thiserror::Error;

/// Why text could not be parsed as an HL7 message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Hl7ParseError {
    #[error("message is empty")]
    EmptyMessage,

    /// The first segment is not an MSH with encoding characters.
    #[error("message does not start with an MSH segment")]
    NotAMessage,

    #[error("malformed segment on line {line}: '{segment}'")]
    MalformedSegment { line: usize, segment: String },
}

/// Errors that abort an HL7 operation.
///
/// Problems with the input data are reported through the read result instead.
#[derive(Debug, Error)]
pub enum Hl7Error {
    /// Single-message writes need exactly one row.
    #[error("a report with {rows} rows cannot be written as a single HL7 message")]
    WrongRowCount { rows: usize },

    /// An HL7 location in a schema or configuration does not parse.
    #[error("invalid HL7 path '{path}'")]
    InvalidPath { path: String },

    /// A component write was asked to step past a field-level path.
    #[error("HL7 path '{path}' has no component to advance")]
    NotAComponent { path: String },

    #[error("element {element} is an AOE question but declares no question code")]
    MissingAoeQuestion { element: String },

    /// Numeric AOE answers are only defined for the patient age question.
    #[error("numeric AOE element {element} is not supported")]
    UnsupportedAoeNumber { element: String },

    #[error("numeric AOE element {element} has no {element}_units value")]
    MissingAoeUnits { element: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

pub type Result<T> = std::result::Result<T, Hl7Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Hl7Error::WrongRowCount { rows: 2 };
        assert_eq!(
            err.to_string(),
            "a report with 2 rows cannot be written as a single HL7 message"
        );

        let err = Hl7ParseError::MalformedSegment {
            line: 3,
            segment: "P1D|x".to_string(),
        };
        assert_eq!(err.to_string(), "malformed segment on line 3: 'P1D|x'");
    }
}
