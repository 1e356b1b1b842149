#![allow(missing_docs)]

use elr_map::{ElementValue, MapperRegistry};
use elr_model::{Element, ElementType, Metadata, Schema, SetSystem, ValueSet, ValueSetValue};

fn metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata.add_value_set(
        ValueSet::new("hl70001", SetSystem::Hl7)
            .with_reference("HL70001")
            .with_value(ValueSetValue::new("F", "Female"))
            .with_value(ValueSetValue::new("M", "Male")),
    );
    metadata
}

#[test]
fn test_lookup_maps_display_to_code() {
    let metadata = metadata();
    let registry = MapperRegistry::with_builtins();
    let source = Element::new("sex_text", ElementType::Text);
    let target = Element::new("patient_sex", ElementType::Code)
        .with_value_set("hl70001")
        .with_mapper("lookup", &["sex_text"]);

    let mapper = registry.get("lookup", &target.name).expect("lookup mapper");
    let names = mapper
        .value_names(&target, &target.mapper_args)
        .expect("value names");
    assert_eq!(names, vec!["sex_text".to_string()]);

    let values = [ElementValue {
        element: &source,
        value: "female",
    }];
    let value = mapper
        .apply(&target, &target.mapper_args, &values, &metadata)
        .expect("apply");
    assert_eq!(value.as_deref(), Some("F"));
}

#[test]
fn test_validate_accepts_builtin_schema() {
    let registry = MapperRegistry::with_builtins();
    let schema = Schema::new(
        "lab",
        "covid-19",
        vec![
            Element::new("first", ElementType::PersonName),
            Element::new("middle", ElementType::PersonName),
            Element::new("middle_initial", ElementType::Text)
                .with_mapper("middleInitial", &["middle"]),
            Element::new("display_name", ElementType::Text)
                .with_mapper("concat", &["first", "middle_initial"]),
            Element::new("created", ElementType::Datetime).with_mapper("timestamp", &[]),
        ],
    )
    .expect("schema");
    registry.validate(&schema).expect("valid mappers");
}
