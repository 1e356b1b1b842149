//! Canonical record model for electronic lab reporting.
//!
//! Every codec converts to and from the types defined here:
//!
//! - [`Schema`] / [`Element`]: the declarative record shape and its CSV, HL7
//!   and JSON bindings
//! - [`ValueSet`]: code tables with display, system and version lookups
//! - [`Report`]: normalized rows bound to a schema
//! - [`ReadResult`] / [`IssueLog`]: the outcome of reading external input
//! - [`Metadata`]: the shared catalog of schemas and value sets
//! - [`TranslationConfig`]: receiver options consulted while writing
//!
//! # Example
//!
//! ```ignore
//! use elr_model::{Element, ElementType, Metadata, Schema};
//!
//! let schema = Schema::new("lab", "covid-19", vec![
//!     Element::new("message_id", ElementType::Id).required(),
//! ])?;
//! let mut metadata = Metadata::new();
//! metadata.add_schema(schema)?;
//! ```

mod config;
mod element;
mod error;
mod issue;
mod metadata;
pub mod normalize;
mod report;
mod schema;
mod valueset;

// === Error Types ===
pub use error::{ModelError, Result};

// === Schema ===
pub use element::{AOE_FIELD, Cardinality, CsvField, Element, ElementType};
pub use schema::{Schema, SchemaDefinition};

// === Value Sets ===
pub use valueset::{SetSystem, ValueSet, ValueSetValue};

// === Reports and Issues ===
pub use issue::{Issue, IssueDetail, IssueLog, IssueScope, IssueSeverity, ReadResult};
pub use report::{Report, Row, Source};

// === Catalog and Configuration ===
pub use config::{Destination, PhoneNumberFormatting, TranslationConfig};
pub use metadata::Metadata;
