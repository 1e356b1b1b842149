//! Writing reports as newline-delimited nested JSON.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use elr_model::normalize::{PhoneNumber, parse_date, parse_datetime, zip_five};
use elr_model::{Element, ElementType, Metadata, Report, Schema, SetSystem, ValueSet};
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::error::{RedoxError, Result};
use crate::json::JsonWriter;
use crate::plan::{FieldSource, PlannedField, Transition, field_plan, transition_plan};

/// A schema's fields in write order with the events before each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    pub fields: Vec<PlannedField>,
    /// `fields.len() + 1` entries; the last closes everything still open.
    pub transitions: Vec<Vec<Transition>>,
    /// Element names of the schema the plan was computed from.
    pub elements: Vec<String>,
}

impl SchemaPlan {
    pub fn new(schema: &Schema) -> Result<Self> {
        let fields = field_plan(schema)?;
        let transitions = transition_plan(&fields);
        debug!(schema = schema.name(), fields = fields.len(), "computed JSON plan");
        Ok(Self {
            fields,
            transitions,
            elements: schema.elements().iter().map(|element| element.name.clone()).collect(),
        })
    }

    /// Whether this plan was computed from a schema with `schema`'s elements.
    pub fn matches(&self, schema: &Schema) -> bool {
        self.elements.len() == schema.len()
            && self
                .elements
                .iter()
                .zip(schema.elements())
                .all(|(name, element)| *name == element.name)
    }
}

/// Writes reports as one JSON object per row.
///
/// Plans are cached by schema name. Concurrent writers of an uncached schema
/// may each compute the plan, but only the first insert is kept. A cached plan
/// whose elements no longer match the schema is recomputed and replaced.
pub struct RedoxSerializer {
    metadata: Arc<Metadata>,
    plans: papaya::HashMap<String, Arc<SchemaPlan>>,
}

impl fmt::Debug for RedoxSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedoxSerializer")
            .field("cached_plans", &self.plans.len())
            .finish_non_exhaustive()
    }
}

impl RedoxSerializer {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self {
            metadata,
            plans: papaya::HashMap::new(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of schemas with a cached plan.
    pub fn cached_plans(&self) -> usize {
        self.plans.len()
    }

    /// Cached plan for `schema`, computed on first use.
    pub fn plan(&self, schema: &Schema) -> Result<Arc<SchemaPlan>> {
        let plans = self.plans.pin();
        match plans.get(schema.name()) {
            Some(plan) if plan.matches(schema) => return Ok(Arc::clone(plan)),
            Some(_) => {
                debug!(schema = schema.name(), "schema changed, replacing JSON plan");
                let plan = Arc::new(SchemaPlan::new(schema)?);
                plans.insert(schema.name().to_string(), Arc::clone(&plan));
                return Ok(plan);
            }
            None => {}
        }
        let plan = Arc::new(SchemaPlan::new(schema)?);
        Ok(Arc::clone(plans.get_or_insert(schema.name().to_string(), plan)))
    }

    /// Write every row, stamping `Meta.EventDateTime` with the current time.
    pub fn write<W: Write>(&self, report: &Report, sink: W) -> Result<()> {
        self.write_at(report, sink, Utc::now().fixed_offset())
    }

    /// Write every row as a JSON object, objects separated by newlines.
    pub fn write_at<W: Write>(
        &self,
        report: &Report,
        mut sink: W,
        now: DateTime<FixedOffset>,
    ) -> Result<()> {
        for row in 0..report.row_count() {
            if row > 0 {
                sink.write_all(b"\n")?;
            }
            sink.write_all(&self.create_message(report, row, now)?)?;
        }
        sink.flush()?;
        debug!(
            schema = report.schema().name(),
            rows = report.row_count(),
            "wrote JSON"
        );
        Ok(())
    }

    /// The JSON object for one row.
    pub fn create_message(
        &self,
        report: &Report,
        row: usize,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<u8>> {
        let schema = report.schema();
        let plan = self.plan(schema)?;
        let mut writer = JsonWriter::new();
        writer.start_object(None)?;
        for (field, transitions) in plan.fields.iter().zip(&plan.transitions) {
            for transition in transitions {
                writer.apply(transition)?;
            }
            let value = match &field.source {
                FieldSource::Constant(value) => Some(Value::from(*value)),
                FieldSource::CurrentTime => Some(Value::from(
                    now.to_rfc3339_opts(SecondsFormat::Millis, false),
                )),
                FieldSource::Element(index) => {
                    let element = schema.elements().get(*index).ok_or_else(|| {
                        RedoxError::StalePlan {
                            schema: schema.name().to_string(),
                            index: *index,
                        }
                    })?;
                    let value_set = self.metadata.element_value_set(element)?;
                    json_value(element, value_set, report.value(row, &element.name))
                }
            };
            if let Some(value) = value {
                writer.field(&field.leaf, &value)?;
            }
        }
        if let Some(closing) = plan.transitions.last() {
            for transition in closing {
                writer.apply(transition)?;
            }
        }
        writer.end_object()?;
        Ok(writer.into_bytes())
    }
}

/// Type-directed JSON form of a normalized value; `None` for blanks.
fn json_value(element: &Element, value_set: Option<&ValueSet>, value: &str) -> Option<Value> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let json = match element.element_type {
        ElementType::Date => match parse_date(value, None) {
            Some(date) => Value::from(date.format("%Y-%m-%d").to_string()),
            None => unformatted(element, value),
        },
        ElementType::Datetime => match parse_datetime(value, None) {
            Some(dt) => Value::from(dt.to_rfc3339()),
            None => unformatted(element, value),
        },
        ElementType::Number => number(value).unwrap_or_else(|| unformatted(element, value)),
        ElementType::Code => code(element, value_set, value),
        ElementType::PostalCode => Value::from(zip_five(value)),
        ElementType::Email => Value::Array(vec![Value::from(value)]),
        ElementType::Telephone => match PhoneNumber::parse(value) {
            Some(phone) => Value::from(phone.to_e164()),
            None => unformatted(element, value),
        },
        _ => Value::from(value),
    };
    Some(json)
}

fn unformatted(element: &Element, value: &str) -> Value {
    warn!(element = %element.name, "value does not match its type, writing as text");
    Value::from(value)
}

fn number(value: &str) -> Option<Value> {
    if let Ok(integer) = value.parse::<i64>() {
        return Some(Value::from(integer));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// SNOMED codes keep the code and system with the display; other codes are
/// written as their display, with `Yes` and `No` as booleans.
fn code(element: &Element, value_set: Option<&ValueSet>, value: &str) -> Value {
    let display = if element.alt_values.is_empty() {
        value_set.and_then(|set| set.to_display_from_code(value))
    } else {
        element
            .alt_values
            .iter()
            .find(|alt| alt.code.eq_ignore_ascii_case(value))
            .and_then(|alt| alt.display.as_deref())
    };
    if let Some(set) = value_set
        && set.system == SetSystem::SnomedCt
    {
        let system = set.to_system_from_code(value).unwrap_or_default();
        return Value::from(format!("{value}^{}^{system}", display.unwrap_or_default()));
    }
    match display {
        Some(display) if display.eq_ignore_ascii_case("yes") => Value::Bool(true),
        Some(display) if display.eq_ignore_ascii_case("no") => Value::Bool(false),
        Some(display) => Value::from(display),
        None => Value::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elr_model::ValueSetValue;

    fn yes_no() -> ValueSet {
        ValueSet::new("covid-19/yesno", SetSystem::Hl7)
            .with_value(ValueSetValue::new("Y", "Yes"))
            .with_value(ValueSetValue::new("N", "NO"))
            .with_value(ValueSetValue::new("UNK", "Unknown"))
    }

    #[test]
    fn test_code_booleans() {
        let element = Element::new("first_test", ElementType::Code);
        let set = yes_no();
        assert_eq!(code(&element, Some(&set), "Y"), Value::Bool(true));
        assert_eq!(code(&element, Some(&set), "N"), Value::Bool(false));
        assert_eq!(code(&element, Some(&set), "UNK"), Value::from("Unknown"));
        assert_eq!(code(&element, None, "Z"), Value::from("Z"));
    }

    #[test]
    fn test_snomed_code_keeps_code() {
        let element = Element::new("test_result", ElementType::Code);
        let set = ValueSet::new("covid-19/test_result", SetSystem::SnomedCt)
            .with_value(ValueSetValue::new("260373001", "Detected"));
        assert_eq!(
            code(&element, Some(&set), "260373001"),
            Value::from("260373001^Detected^SCT")
        );
    }

    #[test]
    fn test_typed_values() {
        let date = Element::new("d", ElementType::Date);
        assert_eq!(json_value(&date, None, "20210105"), Some(Value::from("2021-01-05")));
        let datetime = Element::new("dt", ElementType::Datetime);
        assert_eq!(
            json_value(&datetime, None, "20210105120000-0500"),
            Some(Value::from("2021-01-05T12:00:00-05:00"))
        );
        let age = Element::new("patient_age", ElementType::Number);
        assert_eq!(json_value(&age, None, "42"), Some(Value::from(42)));
        assert_eq!(json_value(&age, None, "2.5"), Some(Value::from(2.5)));
        let phone = Element::new("phone", ElementType::Telephone);
        assert_eq!(
            json_value(&phone, None, "5205551234:1:"),
            Some(Value::from("+15205551234"))
        );
        let zip = Element::new("zip", ElementType::PostalCode);
        assert_eq!(json_value(&zip, None, "85001-1234"), Some(Value::from("85001")));
        assert_eq!(json_value(&zip, None, "  "), None);
    }
}
