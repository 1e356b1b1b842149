//! Element definitions and per-type value handling.

use std::fmt::{Display, Write as _};

use serde::{Deserialize, Serialize};

use crate::issue::IssueDetail;
use crate::normalize::{
    DATE_DISPLAY_FORMAT, DATETIME_DISPLAY_FORMAT, EiFields, HdFields, PhoneNumber,
    format_date, format_datetime, is_postal_code, java_to_chrono_pattern, parse_date,
    parse_datetime, zip_five,
};
use crate::valueset::{ValueSet, ValueSetValue};

/// HL7 field marker for ask-on-entry questions.
pub const AOE_FIELD: &str = "AOE";

/// Semantic type of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    #[default]
    Text,
    TextOrBlank,
    Blank,
    Number,
    Date,
    Datetime,
    Duration,
    Code,
    Table,
    TableOrBlank,
    Ei,
    Hd,
    Id,
    IdClia,
    IdDln,
    IdSsn,
    IdNpi,
    Street,
    StreetOrBlank,
    City,
    PostalCode,
    PersonName,
    Telephone,
    Email,
}

impl ElementType {
    /// Types whose values may legitimately be blank.
    pub fn allows_blank(self) -> bool {
        matches!(
            self,
            Self::TextOrBlank | Self::Blank | Self::TableOrBlank | Self::StreetOrBlank
        )
    }

    pub fn is_table(self) -> bool {
        matches!(self, Self::Table | Self::TableOrBlank)
    }
}

/// Whether a value is required in every row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    One,
    #[default]
    ZeroOrOne,
}

/// One physical CSV column contributing to an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvField {
    pub name: String,
    pub format: Option<String>,
}

impl CsvField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// One logical field of a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Element {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub cardinality: Cardinality,
    pub can_be_blank: bool,
    pub default: Option<String>,
    #[serde(rename = "mapper")]
    pub mapper_ref: Option<String>,
    pub mapper_args: Vec<String>,
    pub value_set: Option<String>,
    /// Extra display values accepted with the `$alt` format.
    pub alt_values: Vec<ValueSetValue>,
    /// Joins the parts of a composite CSV column.
    pub delimiter: Option<String>,
    pub csv_fields: Vec<CsvField>,
    pub hl7_field: Option<String>,
    pub hl7_output_fields: Vec<String>,
    #[serde(rename = "hl7_aoe_question")]
    pub hl7_aoe_question: Option<String>,
    pub redox_output_fields: Vec<String>,
    pub documentation: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            element_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.cardinality = Cardinality::One;
        self
    }

    #[must_use]
    pub fn blank_allowed(mut self) -> Self {
        self.can_be_blank = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: impl Into<String>, args: &[&str]) -> Self {
        self.mapper_ref = Some(mapper.into());
        self.mapper_args = args.iter().map(|arg| (*arg).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_value_set(mut self, name: impl Into<String>) -> Self {
        self.value_set = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_csv(mut self, field: CsvField) -> Self {
        self.csv_fields.push(field);
        self
    }

    #[must_use]
    pub fn with_hl7(mut self, field: impl Into<String>) -> Self {
        self.hl7_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_hl7_outputs(mut self, fields: &[&str]) -> Self {
        self.hl7_output_fields = fields.iter().map(|field| (*field).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_aoe_question(mut self, code: impl Into<String>) -> Self {
        self.hl7_field = Some(AOE_FIELD.to_string());
        self.hl7_aoe_question = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_redox(mut self, path: impl Into<String>) -> Self {
        self.redox_output_fields.push(path.into());
        self
    }

    pub fn is_optional(&self) -> bool {
        self.cardinality == Cardinality::ZeroOrOne
    }

    pub fn can_be_blank(&self) -> bool {
        self.can_be_blank || self.element_type.allows_blank()
    }

    pub fn has_mapper(&self) -> bool {
        self.mapper_ref.is_some()
    }

    /// Configured default, ignoring empty strings.
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref().filter(|value| !value.is_empty())
    }

    /// Table elements whose output is computed by a mapper over the row.
    pub fn is_table_lookup(&self) -> bool {
        self.element_type.is_table() && self.has_mapper()
    }

    pub fn is_aoe(&self) -> bool {
        self.hl7_field.as_deref() == Some(AOE_FIELD)
    }

    /// Primary HL7 location followed by any additional output locations.
    pub fn hl7_fields(&self) -> impl Iterator<Item = &str> {
        self.hl7_field
            .as_deref()
            .into_iter()
            .chain(self.hl7_output_fields.iter().map(String::as_str))
    }

    fn alt_code_from_display(&self, display: &str) -> Option<&str> {
        self.alt_values
            .iter()
            .find(|alt| {
                alt.display
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(display))
            })
            .map(|alt| alt.code.as_str())
    }

    fn alt_display_from_code(&self, code: &str) -> Option<&str> {
        self.alt_values
            .iter()
            .find(|alt| alt.code.eq_ignore_ascii_case(code))
            .and_then(|alt| alt.display.as_deref())
    }

    /// Validate `value` and convert it to the canonical form for this type.
    ///
    /// Blank input normalizes to an empty string.
    pub fn normalize(
        &self,
        value: &str,
        format: Option<&str>,
        value_set: Option<&ValueSet>,
    ) -> Result<String, IssueDetail> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(String::new());
        }
        match self.element_type {
            ElementType::Date => parse_date(value, format)
                .map(format_date)
                .ok_or_else(|| IssueDetail::InvalidDate {
                    value: value.to_string(),
                    element: self.name.clone(),
                    format: format.unwrap_or(DATE_DISPLAY_FORMAT).to_string(),
                }),
            ElementType::Datetime => parse_datetime(value, format)
                .map(|dt| format_datetime(&dt))
                .ok_or_else(|| IssueDetail::InvalidDateTime {
                    value: value.to_string(),
                    element: self.name.clone(),
                    format: format.unwrap_or(DATETIME_DISPLAY_FORMAT).to_string(),
                }),
            ElementType::Number => value
                .parse::<f64>()
                .map(|_| value.to_string())
                .map_err(|_| IssueDetail::InvalidNumber {
                    value: value.to_string(),
                    element: self.name.clone(),
                }),
            ElementType::Code => self.normalize_code(value, format, value_set),
            ElementType::Telephone => PhoneNumber::parse(value)
                .map(|phone| phone.to_normalized())
                .ok_or_else(|| IssueDetail::InvalidPhone {
                    value: value.to_string(),
                    element: self.name.clone(),
                }),
            ElementType::PostalCode => {
                if is_postal_code(value) {
                    Ok(value.to_string())
                } else {
                    Err(IssueDetail::InvalidPostalCode {
                        value: value.to_string(),
                        element: self.name.clone(),
                    })
                }
            }
            ElementType::Hd => match format {
                Some(token) if token.starts_with("$hd") => Ok(value.to_string()),
                _ => HdFields::parse(value)
                    .map(|hd| hd.to_normalized())
                    .ok_or_else(|| IssueDetail::UnsupportedHd {
                        value: value.to_string(),
                        element: self.name.clone(),
                    }),
            },
            ElementType::Ei => match format {
                Some(token) if token.starts_with("$ei") => Ok(value.to_string()),
                _ => EiFields::parse(value)
                    .map(|ei| ei.to_normalized())
                    .ok_or_else(|| IssueDetail::UnsupportedEi {
                        value: value.to_string(),
                        element: self.name.clone(),
                    }),
            },
            _ => Ok(value.to_string()),
        }
    }

    fn normalize_code(
        &self,
        value: &str,
        format: Option<&str>,
        value_set: Option<&ValueSet>,
    ) -> Result<String, IssueDetail> {
        let Some(set) = value_set else {
            return Ok(value.to_string());
        };
        let code = match format {
            Some("$display") => set.to_code_from_display(value),
            Some("$alt") => self.alt_code_from_display(value),
            _ => set.to_normalized_code(value),
        };
        code.map(str::to_string)
            .ok_or_else(|| IssueDetail::InvalidCode {
                value: value.to_string(),
                element: self.name.clone(),
                value_set: set.name.clone(),
            })
    }

    /// Normalize a composite value assembled from several CSV columns.
    ///
    /// Each part carries the format token of its column. HD and EI parts are
    /// placed by token; other types are joined with the element delimiter.
    pub fn normalize_parts(
        &self,
        parts: &[(Option<&str>, &str)],
        value_set: Option<&ValueSet>,
    ) -> Result<String, IssueDetail> {
        let part = |token: &str| {
            parts
                .iter()
                .find(|(format, _)| *format == Some(token))
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        match self.element_type {
            ElementType::Hd => {
                let hd = HdFields {
                    name: part("$hdName").unwrap_or_default(),
                    universal_id: part("$hdUniversalId"),
                    universal_id_system: part("$hdSystem"),
                };
                Ok(hd.to_normalized())
            }
            ElementType::Ei => {
                let ei = EiFields {
                    name: part("$eiName").unwrap_or_default(),
                    namespace: part("$eiNamespaceId"),
                    universal_id: part("$eiUniversalId"),
                    universal_id_system: part("$eiSystem"),
                };
                Ok(ei.to_normalized())
            }
            _ => {
                let delimiter = self.delimiter.as_deref().unwrap_or(" ");
                let joined = parts
                    .iter()
                    .map(|(_, value)| value.trim())
                    .filter(|value| !value.is_empty())
                    .collect::<Vec<_>>()
                    .join(delimiter);
                let format = match parts {
                    [(format, _)] => *format,
                    _ => None,
                };
                self.normalize(&joined, format, value_set)
            }
        }
    }

    /// Render a normalized value for an external column with `format`.
    pub fn to_formatted(
        &self,
        value: &str,
        format: Option<&str>,
        value_set: Option<&ValueSet>,
    ) -> String {
        if value.is_empty() {
            return String::new();
        }
        let formatted = match (self.element_type, format) {
            (_, None) if self.element_type != ElementType::Telephone => None,
            (ElementType::Date, Some(pattern)) => parse_date(value, None)
                .and_then(|date| render(date.format(&java_to_chrono_pattern(pattern)))),
            (ElementType::Datetime, Some(pattern)) => parse_datetime(value, None)
                .and_then(|dt| render(dt.format(&java_to_chrono_pattern(pattern)))),
            (ElementType::Code, Some("$display")) => value_set
                .and_then(|set| set.to_display_from_code(value))
                .map(str::to_string),
            (ElementType::Code, Some("$system")) => {
                value_set.and_then(|set| set.to_system_from_code(value))
            }
            (ElementType::Code, Some("$alt")) => {
                self.alt_display_from_code(value).map(str::to_string)
            }
            (ElementType::Hd, Some(token)) => HdFields::parse(value).and_then(|hd| match token {
                "$hdName" => Some(hd.name),
                "$hdUniversalId" => hd.universal_id,
                "$hdSystem" => hd.universal_id_system,
                _ => None,
            }),
            (ElementType::Ei, Some(token)) => EiFields::parse(value).and_then(|ei| match token {
                "$eiName" => Some(ei.name),
                "$eiNamespaceId" => ei.namespace,
                "$eiUniversalId" => ei.universal_id,
                "$eiSystem" => ei.universal_id_system,
                _ => None,
            }),
            (ElementType::Telephone, token) => {
                PhoneNumber::parse(value).map(|phone| match token {
                    Some("$country") => phone.country,
                    Some("$extension") => phone.extension,
                    Some("$e164") => phone.to_e164(),
                    _ => phone.area_local(),
                })
            }
            (ElementType::PostalCode, Some("$zipFive")) => Some(zip_five(value)),
            _ => None,
        };
        formatted.unwrap_or_else(|| value.to_string())
    }
}

/// Render a chrono formatter without panicking on unsupported specifiers.
fn render(item: impl Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{item}").ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valueset::SetSystem;

    fn results() -> ValueSet {
        ValueSet::new("covid-19/test_result", SetSystem::SnomedCt)
            .with_value(ValueSetValue::new("260373001", "Detected"))
            .with_value(ValueSetValue::new("260415000", "Not detected"))
    }

    #[test]
    fn test_date_normalization() {
        let element = Element::new("specimen_collection_date", ElementType::Date);
        assert_eq!(element.normalize("2021-03-07", None, None).as_deref(), Ok("20210307"));
        assert_eq!(
            element.normalize("07/03/2021", Some("dd/MM/yyyy"), None).as_deref(),
            Ok("20210307")
        );
        let err = element.normalize("yesterday", None, None).unwrap_err();
        assert!(matches!(err, IssueDetail::InvalidDate { .. }));
        assert_eq!(element.normalize("  ", None, None).as_deref(), Ok(""));
    }

    #[test]
    fn test_code_normalization_by_format() {
        let element = Element::new("test_result", ElementType::Code)
            .with_value_set("covid-19/test_result");
        let set = results();
        assert_eq!(
            element.normalize("260373001", None, Some(&set)).as_deref(),
            Ok("260373001")
        );
        assert_eq!(
            element
                .normalize("not detected", Some("$display"), Some(&set))
                .as_deref(),
            Ok("260415000")
        );
        assert!(matches!(
            element.normalize("positive", None, Some(&set)),
            Err(IssueDetail::InvalidCode { .. })
        ));
    }

    #[test]
    fn test_alt_values() {
        let mut element = Element::new("patient_sex", ElementType::Code).with_value_set("sex");
        element.alt_values = vec![ValueSetValue::new("F", "Female"), ValueSetValue::new("M", "Male")];
        assert_eq!(element.normalize("female", Some("$alt"), None).as_deref(), Ok("female"));
        let set = ValueSet::new("sex", SetSystem::Hl7).with_value(ValueSetValue::new("F", "F"));
        assert_eq!(element.normalize("female", Some("$alt"), Some(&set)).as_deref(), Ok("F"));
        assert_eq!(element.to_formatted("M", Some("$alt"), Some(&set)), "Male");
    }

    #[test]
    fn test_composite_hd() {
        let element = Element::new("ordering_facility", ElementType::Hd);
        let parts = [
            (Some("$hdName"), "Facility"),
            (Some("$hdUniversalId"), "1.2.3"),
            (Some("$hdSystem"), "ISO"),
        ];
        assert_eq!(
            element.normalize_parts(&parts, None).as_deref(),
            Ok("Facility^1.2.3^ISO")
        );
        assert_eq!(element.to_formatted("Facility^1.2.3^ISO", Some("$hdUniversalId"), None), "1.2.3");
    }

    #[test]
    fn test_composite_join_uses_delimiter() {
        let mut element = Element::new("patient_street", ElementType::Street);
        element.delimiter = Some(", ".to_string());
        let parts = [(None, "1 Main St"), (None, ""), (None, "Apt 2")];
        assert_eq!(
            element.normalize_parts(&parts, None).as_deref(),
            Ok("1 Main St, Apt 2")
        );
    }

    #[test]
    fn test_formatting() {
        let date = Element::new("d", ElementType::Date);
        assert_eq!(date.to_formatted("20210307", Some("MM/dd/yyyy"), None), "03/07/2021");
        assert_eq!(date.to_formatted("20210307", None, None), "20210307");

        let phone = Element::new("p", ElementType::Telephone);
        assert_eq!(phone.to_formatted("5555551234:1:", None, None), "5555551234");

        let zip = Element::new("z", ElementType::PostalCode);
        assert_eq!(zip.to_formatted("12345-6789", Some("$zipFive"), None), "12345");

        let code = Element::new("c", ElementType::Code);
        assert_eq!(code.to_formatted("260373001", Some("$display"), Some(&results())), "Detected");
    }

    #[test]
    fn test_blank_rules() {
        let element = Element::new("x", ElementType::TextOrBlank);
        assert!(element.can_be_blank());
        assert!(element.is_optional());
        assert!(!Element::new("y", ElementType::Text).required().is_optional());
    }
}
