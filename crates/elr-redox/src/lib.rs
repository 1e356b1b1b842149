//! Newline-delimited nested JSON output for lab reports.
//!
//! Elements bind to dotted JSON paths (`Patient.Demographics.FirstName`,
//! `Orders[].Results[0].Value`). Each schema's bindings are planned once into
//! an ordered field list and a flat stream of open/close events, cached by
//! schema name, and replayed for every row.
//!
//! # Example
//!
//! ```ignore
//! use elr_redox::RedoxSerializer;
//!
//! let serializer = RedoxSerializer::new(metadata);
//! serializer.write(&report, std::io::stdout())?;
//! ```

mod error;
mod json;
mod plan;
mod serializer;

// === Error Types ===
pub use error::{RedoxError, Result};

// === Planning ===
pub use plan::{
    FieldSource, META_DATA_MODEL, META_EVENT_DATE_TIME, META_EVENT_TYPE, PathSegment,
    PlannedField, Transition, field_plan, transition_plan,
};

// === Writing ===
pub use serializer::{RedoxSerializer, SchemaPlan};
