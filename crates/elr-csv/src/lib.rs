//! Schema-driven CSV codec.
//!
//! # Features
//!
//! - Header matching with missing/unexpected column diagnostics
//! - Two-pass row resolution: CSV values, then mappers and defaults
//! - Row, column and error ceilings
//! - External (formatted, composite columns) and internal (canonical) writers
//!
//! # Example
//!
//! ```ignore
//! use elr_csv::{CsvReadOptions, CsvSerializer};
//!
//! let serializer = CsvSerializer::new(metadata, mappers);
//! let result = serializer.read_external("covid-19", file, vec![], &CsvReadOptions::default(), None)?;
//! if let Some(report) = result.report {
//!     serializer.write_internal(&report, std::io::stdout())?;
//! }
//! ```

mod error;
mod header;
mod options;
mod reader;
pub mod resolve;
mod table;
mod writer;

// === Error Types ===
pub use error::{CsvError, CsvParseFailure, Result};

// === Reading ===
pub use header::HeaderPlan;
pub use options::{CsvReadOptions, REPORT_MAX_ERRORS, REPORT_MAX_ITEM_COLUMNS, REPORT_MAX_ITEMS};
pub use reader::CsvSerializer;
pub use table::{CsvTable, TableFailure, normalize_header, read_table};
