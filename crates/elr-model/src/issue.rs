//! Errors and warnings collected while reading external input.
//!
//! Every issue carries a severity, a scope (the whole report or one item)
//! and a typed detail whose `Display` is the message shown to the sender.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::report::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// What an issue applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum IssueScope {
    /// The input as a whole. Report-scoped errors mean no report was produced.
    Report,
    /// One row or message, numbered from 1 and labeled with its tracking id.
    Item { index: usize, tracking_id: String },
}

impl IssueScope {
    pub fn item(index: usize, tracking_id: impl Into<String>) -> Self {
        Self::Item {
            index,
            tracking_id: tracking_id.into(),
        }
    }

    pub fn tracking_id(&self) -> Option<&str> {
        match self {
            Self::Report => None,
            Self::Item { tracking_id, .. } => Some(tracking_id),
        }
    }
}

/// Typed description of a problem found in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueDetail {
    // === Report shape ===
    RowLimitExceeded { rows: usize, max: usize },
    ColumnLimitExceeded { max: usize },
    RaggedRow { row: u64 },
    CsvParse { message: String },
    MissingRequiredHeader { header: String },
    MissingOptionalHeader { header: String },
    UnexpectedHeader { header: String },
    NoReports,
    TooManyErrors,

    // === HL7 structure ===
    InvalidHl7 { message: String },
    NoMessages,
    MissingMessageType,
    UnsupportedMessageType { message_type: String },

    // === Element values ===
    MissingField { element: String },
    EmptyValue { element: String },
    InvalidDate {
        value: String,
        element: String,
        format: String,
    },
    InvalidDateTime {
        value: String,
        element: String,
        format: String,
    },
    DatePrecision {
        value: String,
        element: String,
        field: String,
    },
    InvalidCode {
        value: String,
        element: String,
        value_set: String,
    },
    InvalidPhone { value: String, element: String },
    InvalidPostalCode { value: String, element: String },
    InvalidNumber { value: String, element: String },
    UnsupportedHd { value: String, element: String },
    UnsupportedEi { value: String, element: String },
    FieldExtraction {
        element: String,
        field: String,
        message: String,
    },
}

impl fmt::Display for IssueDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowLimitExceeded { rows, max } => write!(
                f,
                "Your file's row size of {rows} exceeds the maximum of {max} rows per file. \
                 Reduce the amount of rows in this file."
            ),
            Self::ColumnLimitExceeded { max } => write!(
                f,
                "Number of columns in your report exceeds the maximum of {max} allowed. \
                 Adjust the excess columnar data in your report."
            ),
            Self::RaggedRow { row } => {
                write!(f, "CSV file has an inconsistent number of columns on row: {row}")
            }
            Self::CsvParse { message } => {
                write!(f, "There's an issue parsing your file. Contact support. ({message})")
            }
            Self::MissingRequiredHeader { header } => {
                write!(f, "Your file is missing {header} header.")
            }
            Self::MissingOptionalHeader { header } => write!(f, "Missing {header} header"),
            Self::UnexpectedHeader { header } => {
                write!(f, "Unexpected column header found, '{header}' will be ignored.")
            }
            Self::NoReports => write!(f, "No reports were found in CSV content"),
            Self::TooManyErrors => {
                write!(f, "Report has too many errors. Correct the errors and resubmit.")
            }
            Self::InvalidHl7 { message } => write!(f, "Invalid HL7 message: {message}"),
            Self::NoMessages => write!(f, "No HL7 messages were found"),
            Self::MissingMessageType => write!(f, "Missing required HL7 message type field."),
            Self::UnsupportedMessageType { message_type } => {
                write!(f, "Unsupported HL7 message type '{message_type}'.")
            }
            Self::MissingField { element } => write!(f, "Blank value for element {element}"),
            Self::EmptyValue { element } => write!(f, "Empty value for {element}"),
            Self::InvalidDate {
                value,
                element,
                format,
            } => write!(
                f,
                "Invalid date: '{value}' for element {element}. Reformat to {format}."
            ),
            Self::InvalidDateTime {
                value,
                element,
                format,
            } => write!(
                f,
                "Invalid date time: '{value}' for element {element}. Reformat to {format}."
            ),
            Self::DatePrecision {
                value,
                element,
                field,
            } => write!(
                f,
                "Timestamp '{value}' in {field} for element {element} has less precision than expected."
            ),
            Self::InvalidCode {
                value,
                element,
                value_set,
            } => write!(
                f,
                "Invalid code: '{value}' is not a valid code in value set {value_set} for element {element}."
            ),
            Self::InvalidPhone { value, element } => write!(
                f,
                "Invalid phone number '{value}' for {element}. Reformat to a 10-digit phone number \
                 (e.g. (555) - 555-5555)."
            ),
            Self::InvalidPostalCode { value, element } => write!(
                f,
                "Invalid postal code '{value}' for {element}. Reformat to 5 or 9 digits \
                 (e.g. 12345 or 12345-6789)."
            ),
            Self::InvalidNumber { value, element } => {
                write!(f, "Invalid number '{value}' for {element}.")
            }
            Self::UnsupportedHd { value, element } => write!(
                f,
                "Unsupported HD format for input: '{value}' in {element}. \
                 Use name or name^universalId^universalIdType."
            ),
            Self::UnsupportedEi { value, element } => write!(
                f,
                "Unsupported EI format for input: '{value}' in {element}. \
                 Use name or name^namespace^universalId^universalIdType."
            ),
            Self::FieldExtraction {
                element,
                field,
                message,
            } => write!(f, "Unable to read {field} for element {element}: {message}"),
        }
    }
}

/// A single logged problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    #[serde(flatten)]
    pub scope: IssueScope,
    #[serde(flatten)]
    pub detail: IssueDetail,
}

impl Issue {
    pub fn message(&self) -> String {
        self.detail.to_string()
    }
}

/// Ordered collection of issues produced by one read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLog {
    issues: Vec<Issue>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, scope: IssueScope, detail: IssueDetail) {
        self.issues.push(Issue {
            severity: IssueSeverity::Error,
            scope,
            detail,
        });
    }

    pub fn warning(&mut self, scope: IssueScope, detail: IssueDetail) {
        self.issues.push(Issue {
            severity: IssueSeverity::Warning,
            scope,
            detail,
        });
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: IssueLog) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Outcome of parsing external bytes.
///
/// `report` is `None` when a report-scoped error made the whole input unusable.
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub report: Option<Report>,
    pub issues: IssueLog,
}

impl ReadResult {
    pub fn success(report: Report, issues: IssueLog) -> Self {
        Self {
            report: Some(report),
            issues,
        }
    }

    /// A read that produced no report and a single report-scoped error.
    pub fn failure(detail: IssueDetail) -> Self {
        let mut issues = IssueLog::new();
        issues.error(IssueScope::Report, detail);
        Self {
            report: None,
            issues,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.errors()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.warnings()
    }
}
