use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, FixedOffset, TimeZone};
use elr_model::{
    Element, ElementType, Metadata, Report, Schema, SetSystem, ValueSet, ValueSetValue,
};
use elr_redox::{RedoxError, RedoxSerializer, Transition, field_plan};
use insta::assert_snapshot;
use proptest::prelude::*;
use serde_json::Value;

fn lab_schema() -> Schema {
    Schema::new(
        "redox",
        "covid-19",
        vec![
            Element::new("patient_last_name", ElementType::PersonName).with_redox("Patient.Name"),
            Element::new("patient_dob", ElementType::Date).with_redox("Patient.DOB"),
            Element::new("order_id", ElementType::Id).with_redox("Order.Id"),
            Element::new("test_result", ElementType::Code)
                .with_value_set("covid-19/yesno")
                .with_redox("Order.Results[].Value"),
            Element::new("patient_email", ElementType::Email).with_redox("Patient.Email"),
            Element::new("comment", ElementType::Text).with_redox("Order.Notes"),
        ],
    )
    .expect("schema")
}

fn serializer() -> RedoxSerializer {
    let mut metadata = Metadata::new();
    metadata.add_value_set(
        ValueSet::new("covid-19/yesno", SetSystem::Hl7)
            .with_value(ValueSetValue::new("Y", "Yes"))
            .with_value(ValueSetValue::new("N", "No")),
    );
    metadata.add_schema(lab_schema()).expect("register");
    RedoxSerializer::new(Arc::new(metadata))
}

fn report(serializer: &RedoxSerializer, rows: &[[&str; 6]]) -> Report {
    let schema = Arc::clone(serializer.metadata().schema("redox").expect("schema"));
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|value| (*value).to_string()).collect())
        .collect();
    Report::new(schema, rows, vec![], None).expect("report")
}

fn now() -> DateTime<FixedOffset> {
    FixedOffset::west_opt(5 * 3600)
        .and_then(|offset| offset.with_ymd_and_hms(2021, 1, 5, 12, 30, 0).single())
        .expect("timestamp")
}

fn write(serializer: &RedoxSerializer, report: &Report) -> String {
    let mut out = Vec::new();
    serializer.write_at(report, &mut out, now()).expect("write");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn test_transitions_follow_shared_parents() {
    let schema = Schema::new(
        "paths",
        "covid-19",
        vec![
            Element::new("name", ElementType::Text).with_redox("Patient.Name"),
            Element::new("dob", ElementType::Date).with_redox("Patient.DOB"),
            Element::new("id", ElementType::Id).with_redox("Order.Id"),
        ],
    )
    .expect("schema");
    let fields = field_plan(&schema).expect("plan");
    let paths: Vec<&str> = fields.iter().map(|field| field.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "Meta.DataModel",
            "Meta.EventType",
            "Meta.EventDateTime",
            "Patient.Name",
            "Patient.DOB",
            "Order.Id"
        ]
    );

    let serializer = RedoxSerializer::new(Arc::new(Metadata::new()));
    let plan = serializer.plan(&schema).expect("plan");
    let open = |name: &str| Transition::StartObject(Some(name.to_string()));
    assert_eq!(plan.transitions[3], vec![Transition::EndObject, open("Patient")]);
    assert!(plan.transitions[4].is_empty());
    assert_eq!(plan.transitions[5], vec![Transition::EndObject, open("Order")]);
    assert_eq!(plan.transitions[6], vec![Transition::EndObject]);
}

#[test]
fn test_json_line() {
    let serializer = serializer();
    let report = report(
        &serializer,
        &[["Doe", "19800102", "o-1", "Y", "jane@example.com", "note \"quoted\""]],
    );
    assert_snapshot!(write(&serializer, &report), @r#"{"Meta":{"DataModel":"Results","EventType":"NewUnsolicited","EventDateTime":"2021-01-05T12:30:00.000-05:00"},"Patient":{"Name":"Doe","DOB":"1980-01-02","Email":["jane@example.com"]},"Order":{"Id":"o-1","Notes":"note \"quoted\"","Results":[{"Value":true}]}}"#);
}

#[test]
fn test_blank_values_are_skipped() {
    let serializer = serializer();
    let report = report(&serializer, &[["Doe", "", "o-1", "", "", ""]]);
    let json: Value = serde_json::from_str(&write(&serializer, &report)).expect("json");
    assert_eq!(json["Patient"], serde_json::json!({ "Name": "Doe" }));
    assert_eq!(json["Order"]["Results"], serde_json::json!([{}]));
}

#[test]
fn test_rows_are_newline_delimited() {
    let serializer = serializer();
    let report = report(
        &serializer,
        &[
            ["Doe", "", "o-1", "Y", "", ""],
            ["Roe", "", "o-2", "N", "", ""],
        ],
    );
    let text = write(&serializer, &report);
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(!text.ends_with('\n'));
    assert_eq!(lines[1]["Order"]["Id"], "o-2");
    assert_eq!(lines[1]["Order"]["Results"][0]["Value"], false);
}

#[test]
fn test_plan_cached_once_under_contention() {
    let serializer = serializer();
    let report = report(&serializer, &[["Doe", "", "o-1", "Y", "", ""]]);
    let outputs: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| write(&serializer, &report)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect()
    });
    assert_eq!(serializer.cached_plans(), 1);
    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    let first = serializer.plan(report.schema()).expect("plan");
    let second = serializer.plan(report.schema()).expect("plan");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_plan_replaced_when_schema_changes() {
    let serializer = serializer();
    let wide = report(&serializer, &[["Doe", "", "o-1", "Y", "", ""]]);
    assert!(write(&serializer, &wide).contains("\"Results\""));

    let narrow = Schema::new(
        "redox",
        "covid-19",
        vec![Element::new("order_id", ElementType::Id).with_redox("Order.Id")],
    )
    .expect("schema");
    let narrow = Report::new(Arc::new(narrow), vec![vec!["o-2".to_string()]], vec![], None)
        .expect("report");
    let json: Value = serde_json::from_str(&write(&serializer, &narrow)).expect("json");
    assert_eq!(json["Order"], serde_json::json!({ "Id": "o-2" }));
    assert!(json.get("Patient").is_none());
    assert_eq!(serializer.cached_plans(), 1);
    assert!(serializer.plan(narrow.schema()).expect("plan").matches(narrow.schema()));
}

#[test]
fn test_invalid_path_fails() {
    let mut metadata = Metadata::new();
    let schema = metadata
        .add_schema(
            Schema::new(
                "broken",
                "covid-19",
                vec![Element::new("x", ElementType::Text).with_redox("Patient.Names[")],
            )
            .expect("schema"),
        )
        .expect("register");
    let serializer = RedoxSerializer::new(Arc::new(metadata));
    let report = Report::new(schema, vec![vec!["a".to_string()]], vec![], None).expect("report");
    let err = serializer.write(&report, Vec::new()).expect_err("bad path");
    assert!(matches!(err, RedoxError::InvalidPath { ref element, .. } if element == "x"));
    assert_eq!(serializer.cached_plans(), 0);
}

/// Plain objects are upper case `A`-`C`, arrays `L`/`M`, leaves lower case, so
/// generated paths never bind one key to two shapes.
fn json_path() -> impl Strategy<Value = String> {
    let segment = prop_oneof![
        prop::sample::select(vec!["A", "B", "C"]).prop_map(str::to_string),
        (prop::sample::select(vec!["L", "M"]), 0usize..3)
            .prop_map(|(name, index)| format!("{name}[{index}]")),
    ];
    (
        prop::collection::vec(segment, 0..4),
        prop::sample::select(vec!["x", "y", "z"]),
    )
        .prop_map(|(mut parts, leaf)| {
            parts.push(leaf.to_string());
            parts.join(".")
        })
}

fn count_leaves(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.values().map(count_leaves).sum(),
        Value::Array(items) => items.iter().map(count_leaves).sum(),
        _ => 1,
    }
}

proptest! {
    #[test]
    fn transition_stream_produces_valid_json(paths in prop::collection::vec(json_path(), 1..12)) {
        let paths: BTreeSet<String> = paths.into_iter().collect();
        let elements = paths
            .iter()
            .enumerate()
            .map(|(index, path)| Element::new(format!("e{index}"), ElementType::Text).with_redox(path))
            .collect();
        let schema = Arc::new(Schema::new("generated", "covid-19", elements).expect("schema"));
        let row = vec!["v".to_string(); paths.len()];
        let report = Report::new(Arc::clone(&schema), vec![row], vec![], None).expect("report");

        let serializer = RedoxSerializer::new(Arc::new(Metadata::new()));
        let text = write(&serializer, &report);
        let json: Value = serde_json::from_str(&text).expect("valid JSON");
        prop_assert!(json.is_object());
        // Every binding plus the three metadata fields survives as its own leaf.
        prop_assert_eq!(count_leaves(&json), paths.len() + 3);
    }
}
