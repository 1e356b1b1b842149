//! Reports: canonical rows bound to a schema.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::Destination;
use crate::error::{ModelError, Result};
use crate::schema::Schema;

/// Where a report's data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Client { organization: String, client: String },
    /// A report derived from another in-process stage.
    Named(String),
}

/// One canonical row: a normalized value per schema element, `""` when absent.
pub type Row = Vec<String>;

/// Rows of normalized values with their schema and provenance.
///
/// Reports are never mutated in place; transformations build a new one.
#[derive(Debug, Clone)]
pub struct Report {
    schema: Arc<Schema>,
    rows: Vec<Row>,
    sources: Vec<Source>,
    destination: Option<Arc<Destination>>,
    created: DateTime<FixedOffset>,
}

impl Report {
    /// Build a report, checking every row has one value per element.
    pub fn new(
        schema: Arc<Schema>,
        rows: Vec<Row>,
        sources: Vec<Source>,
        destination: Option<Arc<Destination>>,
    ) -> Result<Self> {
        for (index, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(ModelError::RowWidth {
                    schema: schema.name().to_string(),
                    row: index,
                    expected: schema.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            schema,
            rows,
            sources,
            destination,
            created: Utc::now().fixed_offset(),
        })
    }

    /// Build a report from name-keyed maps; unknown names are ignored.
    pub fn from_maps(
        schema: Arc<Schema>,
        maps: &[BTreeMap<String, String>],
        sources: Vec<Source>,
        destination: Option<Arc<Destination>>,
    ) -> Result<Self> {
        let rows = maps
            .iter()
            .map(|map| {
                schema
                    .elements()
                    .iter()
                    .map(|element| map.get(&element.name).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self::new(schema, rows, sources, destination)
    }

    /// Pin the creation timestamp (used for message headers).
    #[must_use]
    pub fn with_created(mut self, created: DateTime<FixedOffset>) -> Self {
        self.created = created;
        self
    }

    /// A new report over the same schema and provenance with other rows.
    pub fn with_rows(&self, rows: Vec<Row>) -> Result<Self> {
        Ok(Self::new(
            Arc::clone(&self.schema),
            rows,
            self.sources.clone(),
            self.destination.clone(),
        )?
        .with_created(self.created))
    }

    /// One single-row report per row.
    pub fn split(&self) -> Result<Vec<Self>> {
        self.rows
            .iter()
            .map(|row| self.with_rows(vec![row.clone()]))
            .collect()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_deref()
    }

    pub fn created(&self) -> DateTime<FixedOffset> {
        self.created
    }

    /// Value of `element` in `row`; empty for blank or unknown elements.
    pub fn value(&self, row: usize, element: &str) -> &str {
        self.schema
            .element_index(element)
            .and_then(|index| self.rows.get(row).and_then(|values| values.get(index)))
            .map_or("", String::as_str)
    }

    /// Non-blank value of `element` in `row`.
    pub fn get_string(&self, row: usize, element: &str) -> Option<&str> {
        Some(self.value(row, element)).filter(|value| !value.is_empty())
    }

    /// Non-blank value of the first element bound to HL7 location `field`.
    pub fn get_string_by_hl7_field(&self, row: usize, field: &str) -> Option<&str> {
        let element = self.schema.find_element_by_hl7_field(field)?;
        self.get_string(row, &element.name)
    }

    /// Row as a name-keyed map, blanks omitted.
    pub fn row_map(&self, row: usize) -> BTreeMap<&str, &str> {
        self.schema
            .elements()
            .iter()
            .map(|element| (element.name.as_str(), self.value(row, &element.name)))
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementType};

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                "s",
                "t",
                vec![
                    Element::new("a", ElementType::Text).with_hl7("PID-5"),
                    Element::new("b", ElementType::Text),
                ],
            )
            .expect("schema"),
        )
    }

    #[test]
    fn test_row_width_checked() {
        let err = Report::new(schema(), vec![vec!["x".to_string()]], vec![], None).unwrap_err();
        assert!(matches!(err, ModelError::RowWidth { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_value_access() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), "Smith".to_string());
        map.insert("zzz".to_string(), "ignored".to_string());
        let report = Report::from_maps(schema(), &[map], vec![], None).expect("report");
        assert_eq!(report.value(0, "a"), "Smith");
        assert_eq!(report.value(0, "b"), "");
        assert_eq!(report.get_string(0, "b"), None);
        assert_eq!(report.get_string_by_hl7_field(0, "PID-5"), Some("Smith"));
        assert_eq!(report.row_map(0).len(), 1);
    }

    #[test]
    fn test_split_keeps_created() {
        let report = Report::new(
            schema(),
            vec![
                vec!["1".to_string(), String::new()],
                vec!["2".to_string(), String::new()],
            ],
            vec![Source::Named("test".to_string())],
            None,
        )
        .expect("report");
        let parts = report.split().expect("split");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].value(0, "a"), "2");
        assert_eq!(parts[1].created(), report.created());
    }
}
