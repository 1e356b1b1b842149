//! Mapper error types.

use elr_model::ModelError;
use thiserror::Error;

/// Errors from misconfigured mappers. These are schema authoring defects.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("unknown mapper '{name}' on element {element}")]
    UnknownMapper { name: String, element: String },

    #[error("mapper {mapper} on element {element} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        mapper: &'static str,
        element: String,
        expected: String,
        actual: usize,
    },

    #[error("mapper {mapper} on element {element}: {message}")]
    InvalidArgument {
        mapper: &'static str,
        element: String,
        message: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, MapperError>;
