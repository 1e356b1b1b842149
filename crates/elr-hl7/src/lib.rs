//! HL7 v2.5.1 ORU^R01 codec for schema-driven lab reports.
//!
//! # Features
//!
//! - A small segment/field/component/subcomponent tree with escaping
//! - Path addressing (`OBX(1)-5-2`) for reading and writing values
//! - Per-receiver translation: suppression, truncation, phone layouts,
//!   reporting facility overrides and value replacement
//! - AOE questions written as extra OBX observations and found again on read
//! - FHS/BHS batches, one message per row
//!
//! # Example
//!
//! ```ignore
//! use elr_hl7::Hl7Serializer;
//!
//! let serializer = Hl7Serializer::new(metadata, mappers);
//! let result = serializer.read_external("covid-19", file, vec![], None)?;
//! if let Some(report) = result.report {
//!     serializer.write_batch(&report, std::io::stdout())?;
//! }
//! ```

mod batch;
mod encoding;
mod error;
mod message;
mod path;
mod reader;
mod truncate;
mod writer;

// === Error Types ===
pub use error::{Hl7Error, Hl7ParseError, Result};

// === Message Model ===
pub use encoding::{Delimiters, SEGMENT_DELIMITER};
pub use message::{Message, Segment};
pub use path::Hl7Path;

// === Reading and Writing ===
pub use batch::{batch_footer, batch_header, split_batch};
pub use reader::{MAX_AOE_OBSERVATIONS, MAX_NOTE_LENGTH};
pub use writer::{
    AGE_UNITS_VALUE_SET, AOE_QUESTION_VALUE_SET, HL7_VERSION, Hl7Serializer, SOFTWARE_PRODUCT,
    SOFTWARE_VENDOR, UNKNOWN_VALUE_SET,
};

// === Truncation ===
pub use truncate::{
    CE_FIELDS, HD_FIELDS_LOCAL, HD_FIELDS_UNIVERSAL, HD_TRUNCATION_LIMIT, max_length,
    trim_and_truncate, truncation_limit_with_encoding,
};
