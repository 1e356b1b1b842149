//! Read limits and per-read overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum number of rows accepted in one file.
pub const REPORT_MAX_ITEMS: usize = 10_000;

/// Maximum number of columns accepted in one file.
pub const REPORT_MAX_ITEM_COLUMNS: usize = 2_000;

/// Reading stops once this many errors have accumulated.
pub const REPORT_MAX_ERRORS: usize = 100;

/// Options for reading external CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvReadOptions {
    pub max_items: usize,
    pub max_columns: usize,
    pub max_errors: usize,
    /// Element name -> default replacing the schema default for this read.
    pub default_values: BTreeMap<String, String>,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            max_items: REPORT_MAX_ITEMS,
            max_columns: REPORT_MAX_ITEM_COLUMNS,
            max_errors: REPORT_MAX_ERRORS,
            default_values: BTreeMap::new(),
        }
    }
}

impl CsvReadOptions {
    #[must_use]
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    #[must_use]
    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = max;
        self
    }

    #[must_use]
    pub fn with_default(mut self, element: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_values.insert(element.into(), value.into());
        self
    }
}
