//! Two-pass value resolution for one CSV row.
//!
//! Precedence per element, first match wins:
//!
//! | Step | Source | Applies when |
//! |------|--------|--------------|
//! | 1 | CSV column(s) | every sub-field column exists and is non-blank |
//! | 1 | empty | a sub-field is blank and the element can be blank |
//! | 2 | mapper | CSV did not resolve the element and it has a mapper |
//! | 3 | default | the mapper produced nothing, or there is no mapper |
//! | 4 | empty | nothing above applied |
//!
//! Invalid CSV values are an error for `ONE` elements and a warning otherwise;
//! the element then resolves to empty. A blank final value for a `ONE`
//! element that cannot be blank is an error. A `ZERO_OR_ONE` element that
//! resolves blank is accepted silently.

use std::collections::BTreeMap;

use csv::StringRecord;
use elr_map::{ElementValue, MapperRegistry};
use elr_model::{Element, IssueDetail, IssueSeverity, Metadata, Row, Schema, ValueSet};

use crate::error::Result;
use crate::header::HeaderPlan;

/// Outcome of the first pass for one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Value(String),
    NeedsMapper,
    /// The CSV value failed validation; the issue is already recorded.
    Invalid,
}

impl Resolution {
    fn value(&self) -> Option<&str> {
        match self {
            Self::Value(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

/// An issue found while resolving a row, before its tracking id is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub severity: IssueSeverity,
    pub detail: IssueDetail,
}

/// Per-read inputs shared by every row.
pub struct ResolveContext<'a> {
    pub schema: &'a Schema,
    pub plan: &'a HeaderPlan,
    /// Value set of each element, in schema order.
    pub value_sets: &'a [Option<&'a ValueSet>],
    pub defaults: &'a BTreeMap<String, String>,
}

impl ResolveContext<'_> {
    fn default_for(&self, element: &Element) -> Option<String> {
        self.defaults
            .get(&element.name)
            .map(String::as_str)
            .or_else(|| element.default_value())
            .map(str::to_string)
    }

    /// Steps 2-4 when CSV cannot resolve the element.
    fn fallback(&self, element: &Element) -> Resolution {
        if element.has_mapper() {
            Resolution::NeedsMapper
        } else {
            Resolution::Value(self.default_for(element).unwrap_or_default())
        }
    }
}

/// Resolve every element from CSV columns, defaults and mapper placeholders.
pub fn first_pass(
    ctx: &ResolveContext<'_>,
    record: &StringRecord,
    issues: &mut Vec<RowIssue>,
) -> Vec<Resolution> {
    ctx.schema
        .elements()
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let Some(columns) = &ctx.plan.sources[index] else {
                return ctx.fallback(element);
            };
            let parts: Vec<(Option<&str>, &str)> = element
                .csv_fields
                .iter()
                .zip(columns)
                .map(|(field, column)| (field.format.as_deref(), record.get(*column).unwrap_or("")))
                .collect();
            if parts.iter().any(|(_, value)| value.trim().is_empty()) {
                return if element.can_be_blank() {
                    Resolution::Value(String::new())
                } else {
                    ctx.fallback(element)
                };
            }
            let value_set = ctx.value_sets[index];
            let normalized = match parts.as_slice() {
                [(format, value)] => element.normalize(value, *format, value_set),
                _ => element.normalize_parts(&parts, value_set),
            };
            match normalized {
                Ok(value) => Resolution::Value(value),
                Err(detail) => {
                    let severity = if element.is_optional() {
                        IssueSeverity::Warning
                    } else {
                        IssueSeverity::Error
                    };
                    issues.push(RowIssue { severity, detail });
                    Resolution::Invalid
                }
            }
        })
        .collect()
}

/// Run mappers over first-pass values and apply the blank checks.
pub fn second_pass(
    ctx: &ResolveContext<'_>,
    first: &[Resolution],
    mappers: &MapperRegistry,
    metadata: &Metadata,
    issues: &mut Vec<RowIssue>,
) -> Result<Row> {
    let schema = ctx.schema;
    let mut row = Vec::with_capacity(first.len());
    for (element, resolution) in schema.elements().iter().zip(first) {
        let value = match resolution {
            Resolution::Invalid => {
                row.push(String::new());
                continue;
            }
            Resolution::Value(value) => value.clone(),
            Resolution::NeedsMapper => {
                let mapped = apply_mapper(element, schema, first, mappers, metadata)?;
                mapped
                    .filter(|value| !value.is_empty())
                    .or_else(|| ctx.default_for(element))
                    .unwrap_or_default()
            }
        };
        if value.trim().is_empty() && !element.can_be_blank() && !element.is_optional() {
            issues.push(RowIssue {
                severity: IssueSeverity::Error,
                detail: IssueDetail::EmptyValue {
                    element: element.name.clone(),
                },
            });
        }
        row.push(value);
    }
    Ok(row)
}

fn apply_mapper(
    element: &Element,
    schema: &Schema,
    first: &[Resolution],
    mappers: &MapperRegistry,
    metadata: &Metadata,
) -> Result<Option<String>> {
    let Some(name) = element.mapper_ref.as_deref() else {
        return Ok(None);
    };
    let mapper = mappers.get(name, &element.name)?;
    let names = mapper.value_names(element, &element.mapper_args)?;
    let values: Vec<ElementValue<'_>> = names
        .iter()
        .filter_map(|name| {
            let index = schema.element_index(name)?;
            let value = first[index].value()?;
            Some(ElementValue {
                element: &schema.elements()[index],
                value,
            })
        })
        .collect();
    Ok(mapper.apply(element, &element.mapper_args, &values, metadata)?)
}
