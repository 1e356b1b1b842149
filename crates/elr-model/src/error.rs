//! Error types for the model crate.

use thiserror::Error;

/// Errors raised by schema and catalog authoring defects.
///
/// Bad input data is never reported through this type; it is recorded in an
/// [`IssueLog`](crate::IssueLog) instead.
#[derive(Debug, Error)]
pub enum ModelError {
    // === Catalog lookups ===
    /// No schema registered under this name.
    #[error("unknown schema: {name}")]
    UnknownSchema { name: String },

    /// No value set registered under this name.
    #[error("unknown value set '{name}'")]
    UnknownValueSet { name: String },

    /// An element references a value set that is not registered.
    #[error("element {element} references unknown value set '{value_set}'")]
    MissingValueSet { element: String, value_set: String },

    /// A CODE element declares no value set.
    #[error("element {element} is of type CODE but declares no value set")]
    CodeWithoutValueSet { element: String },

    // === Schema construction ===
    /// Element names must be unique within a schema.
    #[error("schema {schema} has duplicate element {element}")]
    DuplicateElement { schema: String, element: String },

    /// The tracking element must name an element of the schema.
    #[error("schema {schema} tracking element {element} is not defined")]
    UnknownTrackingElement { schema: String, element: String },

    /// A row does not have one value per schema element.
    #[error("row {row} has {actual} values, schema {schema} has {expected} elements")]
    RowWidth {
        schema: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    // === Loading ===
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON definition: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
