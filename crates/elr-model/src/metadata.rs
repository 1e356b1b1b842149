//! Catalog of schemas and value sets shared by the codecs.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use crate::element::{Element, ElementType};
use crate::error::{ModelError, Result};
use crate::schema::Schema;
use crate::valueset::ValueSet;

/// Read-only lookup tables loaded once at startup.
///
/// Names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    schemas: BTreeMap<String, Arc<Schema>>,
    value_sets: BTreeMap<String, Arc<ValueSet>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value_set(&mut self, value_set: ValueSet) {
        self.value_sets
            .insert(value_set.name.to_lowercase(), Arc::new(value_set));
    }

    /// Register a schema after checking its value set references.
    pub fn add_schema(&mut self, schema: Schema) -> Result<Arc<Schema>> {
        for element in schema.elements() {
            self.check_value_set(element)?;
        }
        debug!(
            schema = schema.name(),
            elements = schema.len(),
            "registered schema"
        );
        let schema = Arc::new(schema);
        self.schemas
            .insert(schema.name().to_lowercase(), Arc::clone(&schema));
        Ok(schema)
    }

    fn check_value_set(&self, element: &Element) -> Result<()> {
        match &element.value_set {
            Some(name) if !self.value_sets.contains_key(&name.to_lowercase()) => {
                Err(ModelError::MissingValueSet {
                    element: element.name.clone(),
                    value_set: name.clone(),
                })
            }
            None if element.element_type == ElementType::Code => {
                Err(ModelError::CodeWithoutValueSet {
                    element: element.name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn find_schema(&self, name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(&name.to_lowercase())
    }

    /// Schema by name; an unknown name is a caller error.
    pub fn schema(&self, name: &str) -> Result<&Arc<Schema>> {
        self.find_schema(name)
            .ok_or_else(|| ModelError::UnknownSchema {
                name: name.to_string(),
            })
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.schemas.values()
    }

    pub fn find_value_set(&self, name: &str) -> Option<&ValueSet> {
        self.value_sets.get(&name.to_lowercase()).map(Arc::as_ref)
    }

    pub fn value_set(&self, name: &str) -> Result<&ValueSet> {
        self.find_value_set(name)
            .ok_or_else(|| ModelError::UnknownValueSet {
                name: name.to_string(),
            })
    }

    /// Value set declared by `element`, if it declares one.
    pub fn element_value_set(&self, element: &Element) -> Result<Option<&ValueSet>> {
        element
            .value_set
            .as_deref()
            .map(|name| self.value_set(name))
            .transpose()
    }

    /// Load value sets from a JSON array.
    pub fn load_value_sets<R: Read>(&mut self, reader: R) -> Result<usize> {
        let sets: Vec<ValueSet> = serde_json::from_reader(reader)?;
        let count = sets.len();
        for set in sets {
            self.add_value_set(set);
        }
        debug!(count, "loaded value sets");
        Ok(count)
    }

    /// Load and register one JSON schema definition.
    pub fn load_schema<R: Read>(&mut self, reader: R) -> Result<Arc<Schema>> {
        let schema: Schema = serde_json::from_reader(reader)?;
        self.add_schema(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valueset::{SetSystem, ValueSetValue};

    #[test]
    fn test_unknown_schema_is_error() {
        let metadata = Metadata::new();
        let err = metadata.schema("missing").unwrap_err();
        assert!(matches!(err, ModelError::UnknownSchema { .. }));
    }

    #[test]
    fn test_schema_value_sets_checked() {
        let mut metadata = Metadata::new();
        let schema = Schema::new(
            "s",
            "t",
            vec![Element::new("result", ElementType::Code).with_value_set("Results")],
        )
        .expect("schema");
        assert!(matches!(
            metadata.add_schema(schema.clone()),
            Err(ModelError::MissingValueSet { .. })
        ));

        metadata.add_value_set(
            ValueSet::new("results", SetSystem::SnomedCt)
                .with_value(ValueSetValue::new("260373001", "Detected")),
        );
        metadata.add_schema(schema).expect("registered");
        assert!(metadata.find_schema("S").is_some());
        let element = &metadata.schema("s").expect("schema").elements()[0];
        let set = metadata.element_value_set(element).expect("lookup");
        assert_eq!(set.map(|s| s.name.as_str()), Some("results"));
    }

    #[test]
    fn test_code_requires_value_set() {
        let mut metadata = Metadata::new();
        let schema =
            Schema::new("s", "t", vec![Element::new("c", ElementType::Code)]).expect("schema");
        assert!(matches!(
            metadata.add_schema(schema),
            Err(ModelError::CodeWithoutValueSet { .. })
        ));
    }

    #[test]
    fn test_load_json() {
        let mut metadata = Metadata::new();
        let sets = r#"[{"name": "yesno", "system": "HL7", "values": [{"code": "Y"}]}]"#;
        assert_eq!(metadata.load_value_sets(sets.as_bytes()).expect("sets"), 1);
        let schema = r#"{"name": "mini", "elements": [{"name": "a"}]}"#;
        let loaded = metadata.load_schema(schema.as_bytes()).expect("schema");
        assert_eq!(loaded.name(), "mini");
    }
}
