//! Receiver-specific translation settings consulted while writing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How telephone numbers are laid out in HL7 XTN fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhoneNumberFormatting {
    /// `(555)555-5555` in XTN-1 plus the discrete parts.
    #[default]
    Standard,
    /// Digits only in XTN-1.
    OnlyDigitsInComponentOne,
    /// Area code and local number in XTN-1, no punctuation.
    AreaLocalInComponentOne,
}

/// Translation options for one receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Send MSH-11 as `T` instead of `P`.
    pub use_test_processing_mode: bool,
    /// HL7 paths blanked after population, e.g. `ORC-12-1`.
    pub suppress_hl7_fields: Vec<String>,
    pub suppress_aoe: bool,
    /// Omit OBX-29 `QST` on AOE observations.
    pub suppress_qst_for_aoe: bool,
    /// Emit blank AOE answers as `UNK`.
    pub default_aoe_to_unknown: bool,
    /// Elements whose `ASKU`/`UNK` values are written blank.
    pub use_blank_instead_of_unknown: Vec<String>,
    pub truncate_hd_namespace_ids: bool,
    /// HL7 paths truncated to their component length.
    pub truncate_hl7_fields: Vec<String>,
    pub use_pid14_for_patient_email: bool,
    /// HL7 paths rewritten from date to date time.
    pub convert_timestamp_to_date_time: Vec<String>,
    pub reporting_facility_name: Option<String>,
    pub reporting_facility_id: Option<String>,
    pub reporting_facility_id_type: Option<String>,
    pub phone_number_formatting: PhoneNumberFormatting,
    /// Wrap HL7 output in FHS/BHS batch headers.
    pub use_batch_headers: bool,
    pub receiving_application_name: Option<String>,
    pub receiving_application_oid: Option<String>,
    pub receiving_facility_name: Option<String>,
    pub receiving_facility_oid: Option<String>,
    /// HL7 path -> literal value written last.
    pub replace_value: BTreeMap<String, String>,
}

impl TranslationConfig {
    pub fn is_suppressed(&self, hl7_field: &str) -> bool {
        self.suppress_hl7_fields.iter().any(|field| field == hl7_field)
    }

    pub fn blanks_unknown_for(&self, element: &str) -> bool {
        self.use_blank_instead_of_unknown
            .iter()
            .any(|name| name.eq_ignore_ascii_case(element))
    }

    pub fn truncates(&self, hl7_field: &str) -> bool {
        self.truncate_hl7_fields.iter().any(|field| field == hl7_field)
    }
}

/// A receiver bound to a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Destination {
    pub organization: String,
    pub name: String,
    pub translation: TranslationConfig,
}

impl Destination {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.organization, self.name)
    }
}
