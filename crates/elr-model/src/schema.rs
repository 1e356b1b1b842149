//! Schemas: ordered, immutable element lists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::element::{CsvField, Element};
use crate::error::{ModelError, Result};

/// Serialized form of a schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaDefinition {
    pub name: String,
    pub topic: String,
    pub description: Option<String>,
    pub tracking_element: Option<String>,
    pub elements: Vec<Element>,
}

/// A record shape with per-format bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDefinition", into = "SchemaDefinition")]
pub struct Schema {
    name: String,
    topic: String,
    description: Option<String>,
    tracking_element: Option<String>,
    elements: Vec<Element>,
    index: HashMap<String, usize>,
}

impl TryFrom<SchemaDefinition> for Schema {
    type Error = ModelError;

    fn try_from(def: SchemaDefinition) -> Result<Self> {
        let mut index = HashMap::with_capacity(def.elements.len());
        for (position, element) in def.elements.iter().enumerate() {
            if index.insert(element.name.clone(), position).is_some() {
                return Err(ModelError::DuplicateElement {
                    schema: def.name,
                    element: element.name.clone(),
                });
            }
        }
        if let Some(tracking) = &def.tracking_element
            && !index.contains_key(tracking)
        {
            return Err(ModelError::UnknownTrackingElement {
                schema: def.name.clone(),
                element: tracking.clone(),
            });
        }
        Ok(Self {
            name: def.name,
            topic: def.topic,
            description: def.description,
            tracking_element: def.tracking_element,
            elements: def.elements,
            index,
        })
    }
}

impl From<Schema> for SchemaDefinition {
    fn from(schema: Schema) -> Self {
        Self {
            name: schema.name,
            topic: schema.topic,
            description: schema.description,
            tracking_element: schema.tracking_element,
            elements: schema.elements,
        }
    }
}

impl Schema {
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        elements: Vec<Element>,
    ) -> Result<Self> {
        Self::try_from(SchemaDefinition {
            name: name.into(),
            topic: topic.into(),
            elements,
            ..SchemaDefinition::default()
        })
    }

    /// Designate the element whose value labels row-scoped issues.
    pub fn with_tracking_element(self, element: impl Into<String>) -> Result<Self> {
        let mut def = SchemaDefinition::from(self);
        def.tracking_element = Some(element.into());
        Self::try_from(def)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tracking_element(&self) -> Option<&str> {
        self.tracking_element.as_deref()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn find_element(&self, name: &str) -> Option<&Element> {
        self.element_index(name).map(|index| &self.elements[index])
    }

    /// Element that owns the CSV column `column`.
    pub fn find_element_by_csv_name(&self, column: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|element| element.csv_fields.iter().any(|field| field.name == column))
    }

    /// First element bound to the HL7 location `field`.
    pub fn find_element_by_hl7_field(&self, field: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|element| element.hl7_fields().any(|bound| bound == field))
    }

    /// Every CSV column in schema order, composite elements expanded.
    pub fn csv_fields(&self) -> impl Iterator<Item = (&Element, &CsvField)> {
        self.elements
            .iter()
            .flat_map(|element| element.csv_fields.iter().map(move |field| (element, field)))
    }

    /// Columns that must be present: mandatory elements with no default or mapper.
    pub fn required_csv_headers(&self) -> Vec<&str> {
        self.csv_fields()
            .filter(|(element, _)| is_required_source(element))
            .map(|(_, field)| field.name.as_str())
            .collect()
    }

    /// Columns whose absence is reported as a warning.
    pub fn optional_csv_headers(&self) -> Vec<&str> {
        self.csv_fields()
            .filter(|(element, _)| !is_required_source(element))
            .map(|(_, field)| field.name.as_str())
            .collect()
    }
}

fn is_required_source(element: &Element) -> bool {
    !element.is_optional() && element.default_value().is_none() && !element.has_mapper()
}
