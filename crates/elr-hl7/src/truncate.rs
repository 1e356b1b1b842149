//! Length limits for HL7 components.
//!
//! Receivers that reject long identifiers ask for HD namespace ids or a list
//! of specific components to be cut to the HL7 v2.5.1 table lengths.

use elr_model::TranslationConfig;

/// Maximum length of an HD namespace id.
pub const HD_TRUNCATION_LIMIT: usize = 20;

/// HD namespace-id components.
pub const HD_FIELDS_LOCAL: &[&str] = &[
    "MSH-3-1", "MSH-4-1", "OBR-3-2", "OBR-2-2", "ORC-3-2", "ORC-2-2", "ORC-4-2", "PID-3-4-1",
    "PID-3-6-1", "SPM-2-1-2", "SPM-2-2-2",
];

/// HD universal-id components.
pub const HD_FIELDS_UNIVERSAL: &[&str] = &[
    "MSH-3-2", "MSH-4-2", "OBR-3-3", "OBR-2-3", "ORC-3-3", "ORC-2-3", "ORC-4-3", "PID-3-4-2",
    "PID-3-6-2", "SPM-2-1-3", "SPM-2-2-3",
];

/// Coded-element identifier components.
pub const CE_FIELDS: &[&str] = &["OBX-15-1"];

/// HL7 composite data types with known component lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Composite {
    Ce,
    Cwe,
    Cx,
    Ei,
    Eip,
    Hd,
    Xad,
    Xcn,
    Xon,
    Xpn,
    Xtn,
}

impl Composite {
    fn component_lengths(self) -> &'static [usize] {
        match self {
            Self::Ce => &[20, 199, 20, 20, 199, 20],
            Self::Cwe => &[20, 199, 20, 20, 199, 20, 10, 10, 199],
            Self::Cx => &[15, 1, 3, 227, 5, 227, 5, 227, 8, 8, 705, 705],
            Self::Ei => &[199, 20, 199, 6],
            Self::Eip => &[427, 427],
            Self::Hd => &[20, 199, 6],
            Self::Xad => &[184, 120, 50, 50, 12, 3, 3, 50, 20, 20, 1, 53, 26, 26],
            Self::Xcn => &[
                15, 194, 30, 30, 20, 20, 5, 4, 227, 1, 1, 3, 5, 227, 1, 483, 53, 1, 26, 26, 199,
                705, 705,
            ],
            Self::Xon => &[50, 20, 4, 1, 3, 227, 5, 227, 1, 20],
            Self::Xpn => &[194, 30, 30, 20, 20, 6, 1, 1, 483, 53, 1, 26, 26, 199],
            Self::Xtn => &[199, 3, 8, 199, 3, 5, 9, 5, 199, 4, 6, 199],
        }
    }
}

/// Length of a whole field in its segment table.
fn field_length(segment: &str, field: usize) -> Option<usize> {
    let length = match (segment, field) {
        ("MSH", 3..=6) => 227,
        ("MSH" | "PID" | "OBR" | "OBX" | "SPM", 7) | ("OBX", 14 | 19) | ("SPM", 17) => 26,
        ("MSH", 10) => 199,
        ("PID", 8) | ("OBX", 11) => 1,
        ("OBX", 2) => 2,
        ("ORC" | "OBR", 2 | 3) | ("OBX", 18) => 22,
        ("SPM", 2) => 80,
        ("OBX", 23) => 567,
        ("PID", 3 | 5 | 11 | 13 | 14 | 22)
        | ("ORC", 12 | 14 | 21 | 22 | 23)
        | ("OBR", 4 | 16 | 17)
        | ("OBX", 3 | 6 | 15 | 24)
        | ("SPM", 4 | 8) => 250,
        _ => return None,
    };
    Some(length)
}

/// Data type of the fields this codec writes.
fn field_type(segment: &str, field: usize) -> Option<Composite> {
    let composite = match (segment, field) {
        ("MSH", 3..=6) => Composite::Hd,
        ("PID", 3) => Composite::Cx,
        ("PID", 5) => Composite::Xpn,
        ("PID" | "ORC", 11 | 22) | ("OBX", 24) => Composite::Xad,
        ("PID", 13 | 14) | ("ORC", 14 | 23) | ("OBR", 17) => Composite::Xtn,
        ("ORC" | "OBR", 2 | 3) | ("OBX", 18) => Composite::Ei,
        ("ORC", 12) | ("OBR", 16) => Composite::Xcn,
        ("ORC", 21) | ("OBX", 23) => Composite::Xon,
        ("OBX", 15) => Composite::Ce,
        ("OBR", 4) | ("OBX", 3 | 6) | ("SPM", 4 | 8) => Composite::Cwe,
        ("SPM", 2) => Composite::Eip,
        _ => return None,
    };
    Some(composite)
}

/// Length of `hl7_field` in its HL7 table, e.g. 199 for `PID-13-4`.
///
/// Field-level paths like `PID-7` use the length of the whole field.
fn component_length(hl7_field: &str) -> Option<usize> {
    let mut parts = hl7_field.split('-');
    let segment = parts.next()?;
    let field: usize = parts.next()?.parse().ok()?;
    let Some(component) = parts.next() else {
        return field_length(segment, field);
    };
    let component: usize = component.parse().ok()?;
    let lengths = field_type(segment, field)?.component_lengths();
    lengths.get(component.checked_sub(1)?).copied()
}

/// Reduce `limit` by two for every delimiter in the part of `value` that would
/// be kept, since each one escapes to three characters on the wire.
pub fn truncation_limit_with_encoding(value: &str, limit: usize) -> usize {
    let special = value
        .chars()
        .take(limit)
        .filter(|c| matches!(c, '&' | '^' | '~' | '|'))
        .count();
    limit.saturating_sub(special * 2)
}

/// Maximum length for a value written to `hl7_field`, if the receiver asks for
/// truncation there.
pub fn max_length(hl7_field: &str, value: &str, config: &TranslationConfig) -> Option<usize> {
    if config.truncate_hd_namespace_ids && HD_FIELDS_LOCAL.contains(&hl7_field) {
        return Some(truncation_limit_with_encoding(value, HD_TRUNCATION_LIMIT));
    }
    if config.truncates(hl7_field) {
        return component_length(hl7_field).map(|limit| truncation_limit_with_encoding(value, limit));
    }
    None
}

/// Trim, then cut to `max_length` characters and trim the cut end.
pub fn trim_and_truncate(value: &str, max_length: Option<usize>) -> String {
    let trimmed = value.trim_start();
    match max_length {
        Some(max) => {
            let cut: String = trimmed.chars().take(max).collect();
            cut.trim_end().to_string()
        }
        None => trimmed.trim_end().to_string(),
    }
}
