//! Reading ORU^R01 messages and batches into reports.

use std::io::Read;
use std::sync::{Arc, LazyLock};

use elr_map::ElementValue;
use elr_model::normalize::{EiFields, HdFields, PhoneNumber};
use elr_model::{
    Destination, Element, ElementType, IssueDetail, IssueLog, IssueScope, IssueSeverity,
    ReadResult, Report, Row, Schema, Source, ValueSet,
};
use regex::Regex;
use tracing::{debug, warn};

use crate::batch::split_batch;
use crate::error::Result;
use crate::message::Message;
use crate::path::Hl7Path;
use crate::writer::Hl7Serializer;

/// OBX repetitions searched for an AOE answer.
pub const MAX_AOE_OBSERVATIONS: usize = 10;

/// Upper bound on concatenated NTE text.
pub const MAX_NOTE_LENGTH: usize = 65536;

static DATETIME_PRECISION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{12,}(\.\d{0,4})?[+-]\d{4}$").expect("Invalid date time precision regex")
});

static DATE_PRECISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8,}").expect("Invalid date precision regex"));

type FieldIssue = (IssueSeverity, IssueDetail);

impl Hl7Serializer {
    /// Parse one message or an FHS/BHS batch into a report, one row per
    /// message.
    ///
    /// Messages with errors are left out of the report; their issues carry
    /// the message's tracking id.
    ///
    /// # Errors
    ///
    /// Fails for an unknown schema, a schema referencing unknown mappers or
    /// value sets, or unreadable input.
    pub fn read_external<R: Read>(
        &self,
        schema_name: &str,
        mut input: R,
        sources: Vec<Source>,
        destination: Option<Arc<Destination>>,
    ) -> Result<ReadResult> {
        let schema = Arc::clone(self.metadata.schema(schema_name)?);
        self.mappers.validate(&schema)?;
        let mut text = String::new();
        input.read_to_string(&mut text)?;

        let mut issues = IssueLog::new();
        let messages = split_batch(&text);
        if messages.is_empty() {
            issues.warning(IssueScope::Report, IssueDetail::NoMessages);
        }

        let value_sets = schema
            .elements()
            .iter()
            .map(|element| self.metadata.element_value_set(element))
            .collect::<elr_model::Result<Vec<_>>>()?;
        let tracking_index = schema
            .tracking_element()
            .and_then(|name| schema.element_index(name));

        let mut rows = Vec::with_capacity(messages.len());
        for (index, text) in messages.iter().enumerate() {
            let item_number = index + 1;
            let mut item: Vec<FieldIssue> = Vec::new();
            let row = match Message::parse(text) {
                Ok(message) => self.decode_message(&schema, &value_sets, &message, &mut item)?,
                Err(err) => {
                    item.push((
                        IssueSeverity::Error,
                        IssueDetail::InvalidHl7 {
                            message: err.to_string(),
                        },
                    ));
                    None
                }
            };
            let tracking_id = row
                .as_ref()
                .zip(tracking_index)
                .map(|(row, i)| row[i].as_str())
                .filter(|id| !id.trim().is_empty())
                .map_or_else(|| format!("message{item_number}"), str::to_string);
            let mut has_errors = false;
            for (severity, detail) in item {
                let scope = IssueScope::item(item_number, tracking_id.clone());
                match severity {
                    IssueSeverity::Error => {
                        has_errors = true;
                        issues.error(scope, detail);
                    }
                    IssueSeverity::Warning => issues.warning(scope, detail),
                }
            }
            match row {
                Some(row) if !has_errors => rows.push(row),
                _ => warn!(schema = schema.name(), message = item_number, "dropped HL7 message"),
            }
        }

        debug!(
            schema = schema.name(),
            messages = messages.len(),
            rows = rows.len(),
            errors = issues.error_count(),
            warnings = issues.warning_count(),
            "read HL7 report"
        );
        let report = Report::new(schema, rows, sources, destination)?;
        Ok(ReadResult::success(report, issues))
    }

    /// Values of one message in schema order, or `None` when the message is
    /// not an ORU^R01.
    fn decode_message(
        &self,
        schema: &Schema,
        value_sets: &[Option<&ValueSet>],
        message: &Message,
        issues: &mut Vec<FieldIssue>,
    ) -> Result<Option<Row>> {
        let message_type = Hl7Path::parse("MSH-9")?;
        let code = message.get(&message_type.with_component(1));
        if code.is_empty() {
            issues.push((IssueSeverity::Error, IssueDetail::MissingMessageType));
            return Ok(None);
        }
        let event = message.get(&message_type.with_component(2));
        let structure = message.get(&message_type.with_component(3));
        if !((code == "ORU" && event == "R01") || structure == "ORU_R01") {
            issues.push((
                IssueSeverity::Warning,
                IssueDetail::UnsupportedMessageType {
                    message_type: format!("{code}^{event}"),
                },
            ));
            return Ok(None);
        }

        let first: Vec<String> = schema
            .elements()
            .iter()
            .zip(value_sets)
            .map(|(element, value_set)| decode_element(element, *value_set, message, issues))
            .collect();

        let mut row = Vec::with_capacity(first.len());
        for (element, value) in schema.elements().iter().zip(&first) {
            let mut value = value.clone();
            if value.is_empty() {
                value = self
                    .apply_mapper(schema, element, &first)?
                    .or_else(|| element.default_value().map(str::to_string))
                    .unwrap_or_default();
            }
            if value.is_empty() {
                if !element.is_optional() && !element.can_be_blank() {
                    issues.push((
                        IssueSeverity::Error,
                        IssueDetail::EmptyValue {
                            element: element.name.clone(),
                        },
                    ));
                } else if element.hl7_fields().next().is_some() {
                    issues.push((
                        IssueSeverity::Warning,
                        IssueDetail::MissingField {
                            element: element.name.clone(),
                        },
                    ));
                }
            }
            row.push(value);
        }
        Ok(Some(row))
    }

    /// Mapper output over the values decoded from the message.
    fn apply_mapper(
        &self,
        schema: &Schema,
        element: &Element,
        first: &[String],
    ) -> Result<Option<String>> {
        let Some(name) = element.mapper_ref.as_deref() else {
            return Ok(None);
        };
        let mapper = self.mappers.get(name, &element.name)?;
        let names = mapper.value_names(element, &element.mapper_args)?;
        let values: Vec<ElementValue<'_>> = names
            .iter()
            .filter_map(|name| {
                let index = schema.element_index(name)?;
                let value = first.get(index).filter(|value| !value.is_empty())?;
                Some(ElementValue {
                    element: &schema.elements()[index],
                    value: value.as_str(),
                })
            })
            .collect();
        let mapped = mapper.apply(element, &element.mapper_args, &values, &self.metadata)?;
        Ok(mapped.filter(|value| !value.trim().is_empty()))
    }
}

/// First non-blank value among the element's HL7 locations.
fn decode_element(
    element: &Element,
    value_set: Option<&ValueSet>,
    message: &Message,
    issues: &mut Vec<FieldIssue>,
) -> String {
    if element.is_aoe() {
        let answer = decode_aoe(element, message);
        return match element.element_type {
            ElementType::Code => decode_code(element, value_set, &answer, issues),
            _ => answer,
        };
    }
    for field in element.hl7_fields() {
        let path = match Hl7Path::parse(field) {
            Ok(path) => path,
            Err(err) => {
                issues.push((
                    IssueSeverity::Error,
                    IssueDetail::FieldExtraction {
                        element: element.name.clone(),
                        field: field.to_string(),
                        message: err.to_string(),
                    },
                ));
                continue;
            }
        };
        let value = if field == "NTE-3" {
            decode_notes(message)
        } else {
            match element.element_type {
                ElementType::Telephone => decode_telephone(message, &path),
                ElementType::Email => decode_email(message, &path),
                ElementType::Date | ElementType::Datetime => {
                    decode_date(element, field, message.get(&path), issues)
                }
                ElementType::Code => decode_code(element, value_set, message.get(&path), issues),
                ElementType::Hd | ElementType::Ei if path.is_field() => {
                    decode_identifier(element.element_type, message, &path)
                }
                _ => message.get(&path).trim().to_string(),
            }
        };
        if !value.is_empty() {
            return value;
        }
    }
    String::new()
}

/// OBX-5 of the first observation, among the first ten, whose OBX-3 code is
/// the element's question.
fn decode_aoe(element: &Element, message: &Message) -> String {
    let Some(question) = element.hl7_aoe_question.as_deref() else {
        return String::new();
    };
    message
        .segments_named("OBX")
        .take(MAX_AOE_OBSERVATIONS)
        .find(|obx| obx.get(3, 0, 1, 1).eq_ignore_ascii_case(question.trim()))
        .map(|obx| obx.get(5, 0, 1, 1).trim().to_string())
        .unwrap_or_default()
}

/// HD and EI components rejoined into the `^`-separated normalized form.
fn decode_identifier(element_type: ElementType, message: &Message, path: &Hl7Path) -> String {
    let part = |n: usize| message.get(&path.with_component(n)).trim().to_string();
    let some = |n: usize| Some(part(n)).filter(|value| !value.is_empty());
    if element_type == ElementType::Hd {
        HdFields {
            name: part(1),
            universal_id: some(2),
            universal_id_system: some(3),
        }
        .to_normalized()
    } else {
        EiFields {
            name: part(1),
            namespace: some(2),
            universal_id: some(3),
            universal_id_system: some(4),
        }
        .to_normalized()
    }
}

/// XTN repetitions back to `areaLocal:country:extension`, preferring the
/// discrete area and local components over component one.
fn decode_telephone(message: &Message, path: &Hl7Path) -> String {
    let Some(segment) = message.segment(&path.segment, path.segment_rep) else {
        return String::new();
    };
    for rep in 0..segment.repetitions(path.field) {
        let component = |n: usize| segment.get(path.field, rep, n, 1).trim();
        let kind = component(3);
        if !(kind.is_empty() || kind == "PH") {
            continue;
        }
        let (area, local) = (component(6), component(7));
        let phone = if !area.is_empty() && !local.is_empty() {
            let country = match component(5) {
                "" => "1",
                country => country,
            };
            PhoneNumber::parse(&format!("{area}{local}:{country}:{}", component(8)))
        } else {
            PhoneNumber::parse(component(1))
        };
        if let Some(phone) = phone {
            return phone.to_normalized();
        }
    }
    String::new()
}

/// XTN-4 of the first internet repetition.
fn decode_email(message: &Message, path: &Hl7Path) -> String {
    let Some(segment) = message.segment(&path.segment, path.segment_rep) else {
        return String::new();
    };
    (0..segment.repetitions(path.field))
        .filter(|rep| {
            let kind = segment.get(path.field, *rep, 3, 1);
            kind.is_empty() || kind == "Internet"
        })
        .map(|rep| segment.get(path.field, rep, 4, 1).trim())
        .find(|address| !address.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

fn decode_date(
    element: &Element,
    field: &str,
    raw: &str,
    issues: &mut Vec<FieldIssue>,
) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    let precise = if element.element_type == ElementType::Date {
        DATE_PRECISION.is_match(raw)
    } else {
        DATETIME_PRECISION.is_match(raw)
    };
    if !precise {
        issues.push((
            IssueSeverity::Warning,
            IssueDetail::DatePrecision {
                value: raw.to_string(),
                element: element.name.clone(),
                field: field.to_string(),
            },
        ));
    }
    match element.normalize(raw, None, None) {
        Ok(value) => value,
        Err(detail) => {
            let severity = if element.is_optional() {
                IssueSeverity::Warning
            } else {
                IssueSeverity::Error
            };
            issues.push((severity, detail));
            String::new()
        }
    }
}

/// Canonical code for `raw`. Unknown codes are kept with a warning.
fn decode_code(
    element: &Element,
    value_set: Option<&ValueSet>,
    raw: &str,
    issues: &mut Vec<FieldIssue>,
) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    let format = if element.alt_values.is_empty() {
        None
    } else {
        Some("$alt")
    };
    match element.normalize(raw, format, value_set) {
        Ok(code) => code,
        Err(detail) => {
            issues.push((IssueSeverity::Warning, detail));
            raw.to_string()
        }
    }
}

/// Every NTE-3 joined with spaces.
fn decode_notes(message: &Message) -> String {
    let notes: Vec<&str> = message
        .segments_named("NTE")
        .map(|nte| nte.get(3, 0, 1, 1).trim())
        .filter(|note| !note.is_empty())
        .collect();
    notes.join(" ").chars().take(MAX_NOTE_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(spec: &str) -> Hl7Path {
        Hl7Path::parse(spec).expect("path")
    }

    #[test]
    fn test_decode_telephone_prefers_discrete_parts() {
        let message = Message::parse(
            "MSH|^~\\&\rPID|1||||||||||||^NET^Internet^a@b.com~(520)555-1234^PRN^PH^^1^520^5551234^12\r",
        )
        .expect("parse");
        assert_eq!(decode_telephone(&message, &path("PID-13")), "5205551234:1:12");
        assert_eq!(decode_email(&message, &path("PID-13")), "a@b.com");
    }

    #[test]
    fn test_decode_telephone_from_component_one() {
        let message = Message::parse("MSH|^~\\&\rORC|RE|||||||||||||(602)555-0000\r").expect("parse");
        assert_eq!(decode_telephone(&message, &path("ORC-14")), "6025550000:1:");
    }

    #[test]
    fn test_notes_joined() {
        let message =
            Message::parse("MSH|^~\\&\rNTE|1||first\rNTE|2||second \rOBX|1\r").expect("parse");
        assert_eq!(decode_notes(&message), "first second");
    }

    #[test]
    fn test_date_precision_warning() {
        let element = Element::new("specimen_collection_date_time", ElementType::Datetime);
        let mut issues = Vec::new();
        assert_eq!(
            decode_date(&element, "SPM-17", "202101051200-0500", &mut issues),
            "20210105120000-0500"
        );
        assert!(issues.is_empty());
        assert_eq!(
            decode_date(&element, "SPM-17", "20210105", &mut issues),
            "20210105000000+0000"
        );
        assert!(matches!(issues[0].1, IssueDetail::DatePrecision { .. }));
    }
}
