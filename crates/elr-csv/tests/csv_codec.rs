use std::sync::Arc;

use elr_csv::{CsvReadOptions, CsvSerializer};
use elr_map::MapperRegistry;
use elr_model::{
    Cardinality, CsvField, Element, ElementType, IssueDetail, IssueScope, Metadata, ReadResult,
    Report, Schema, SetSystem, ValueSet, ValueSetValue,
};
use proptest::prelude::*;

fn lab_schema() -> Schema {
    Schema::new(
        "lab",
        "covid-19",
        vec![
            Element::new("message_id", ElementType::Id)
                .required()
                .with_csv(CsvField::new("Message ID")),
            Element::new("patient_last_name", ElementType::PersonName)
                .required()
                .with_csv(CsvField::new("Last Name")),
            Element::new("patient_state", ElementType::Text)
                .with_default("AZ")
                .with_csv(CsvField::new("State")),
            Element::new("test_result", ElementType::Code)
                .with_value_set("test_result")
                .with_csv(CsvField::new("Result").with_format("$display")),
            Element::new("specimen_collection_date", ElementType::Date)
                .with_csv(CsvField::new("Collected")),
            Element::new("ordering_facility", ElementType::Hd)
                .with_csv(CsvField::new("Facility").with_format("$hdName"))
                .with_csv(CsvField::new("Facility OID").with_format("$hdUniversalId"))
                .with_csv(CsvField::new("Facility OID Type").with_format("$hdSystem")),
            Element::new("summary", ElementType::Text)
                .with_mapper("concat", &["patient_last_name", "patient_state"]),
        ],
    )
    .and_then(|schema| schema.with_tracking_element("message_id"))
    .expect("schema")
}

fn serializer() -> CsvSerializer {
    let mut metadata = Metadata::new();
    metadata.add_value_set(
        ValueSet::new("test_result", SetSystem::SnomedCt)
            .with_value(ValueSetValue::new("260373001", "Detected"))
            .with_value(ValueSetValue::new("260415000", "Not detected")),
    );
    metadata.add_schema(lab_schema()).expect("register");
    CsvSerializer::new(Arc::new(metadata), Arc::new(MapperRegistry::with_builtins()))
}

fn read(serializer: &CsvSerializer, input: &str, options: &CsvReadOptions) -> ReadResult {
    serializer
        .read_external("lab", input.as_bytes(), vec![], options, None)
        .expect("read")
}

#[test]
fn test_missing_optional_header_with_default() {
    let input = "Message ID,Last Name,Result,Collected,Facility,Facility OID,Facility OID Type\n\
                 m1,Doe,Detected,2021-01-05,Lab,1.2.3,ISO\n";
    let result = read(&serializer(), input, &CsvReadOptions::default());
    let report = result.report.as_ref().expect("report");
    assert_eq!(result.errors().count(), 0);
    let warnings: Vec<String> = result.warnings().map(|issue| issue.message()).collect();
    assert_eq!(warnings, vec!["Missing State header".to_string()]);

    assert_eq!(report.row_count(), 1);
    assert_eq!(report.value(0, "patient_state"), "AZ");
    assert_eq!(report.value(0, "test_result"), "260373001");
    assert_eq!(report.value(0, "specimen_collection_date"), "20210105");
    assert_eq!(report.value(0, "ordering_facility"), "Lab^1.2.3^ISO");
    assert_eq!(report.value(0, "summary"), "Doe, AZ");
}

#[test]
fn test_blank_required_value_drops_row() {
    let input = "Message ID,Last Name,State\nm1,,CA\nm2,Roe,CA\n";
    let result = read(&serializer(), input, &CsvReadOptions::default());
    let errors: Vec<_> = result.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message(), "Empty value for patient_last_name");
    assert_eq!(errors[0].scope, IssueScope::item(1, "m1"));

    let report = result.report.expect("report");
    assert_eq!(report.row_count(), 1);
    assert_eq!(report.value(0, "message_id"), "m2");
}

#[test]
fn test_blank_tracking_id_synthesized() {
    let input = "Message ID,Last Name\n,Doe\n";
    let result = read(&serializer(), input, &CsvReadOptions::default());
    let error = result.errors().next().expect("error");
    assert_eq!(error.scope, IssueScope::item(1, "row1"));
}

#[test]
fn test_row_ceiling_is_single_report_error() {
    let mut input = String::from("Message ID,Last Name\n");
    for i in 0..6 {
        input.push_str(&format!("m{i},Doe\n"));
    }
    let options = CsvReadOptions::default().with_max_items(5);
    let result = read(&serializer(), &input, &options);
    assert!(result.report.is_none());
    let errors: Vec<_> = result.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].scope, IssueScope::Report);
    assert_eq!(
        errors[0].detail,
        IssueDetail::RowLimitExceeded { rows: 6, max: 5 }
    );
}

#[test]
fn test_ragged_input_has_no_report() {
    let input = "Message ID,Last Name\nm1,Doe,extra\n";
    let result = read(&serializer(), input, &CsvReadOptions::default());
    assert!(result.report.is_none());
    let messages: Vec<String> = result.errors().map(|issue| issue.message()).collect();
    assert_eq!(
        messages,
        vec!["CSV file has an inconsistent number of columns on row: 2".to_string()]
    );
}

#[test]
fn test_missing_required_header_has_no_report() {
    let input = "Message ID,State\nm1,CA\n";
    let result = read(&serializer(), input, &CsvReadOptions::default());
    assert!(result.report.is_none());
    assert_eq!(
        result.errors().next().map(|issue| issue.message()).as_deref(),
        Some("Your file is missing Last Name header.")
    );
}

#[test]
fn test_empty_input_warns() {
    let result = read(&serializer(), "Message ID,Last Name\n", &CsvReadOptions::default());
    let report = result.report.as_ref().expect("empty report");
    assert!(report.is_empty());
    assert_eq!(
        result.warnings().next().map(|issue| issue.detail.clone()),
        Some(IssueDetail::NoReports)
    );
}

#[test]
fn test_unexpected_header_warns() {
    let input = "Message ID,Last Name,Shoe Size\nm1,Doe,9\n";
    let result = read(&serializer(), input, &CsvReadOptions::default());
    assert!(result.warnings().any(|issue| issue.detail
        == IssueDetail::UnexpectedHeader {
            header: "Shoe Size".to_string()
        }));
    assert_eq!(result.report.expect("report").row_count(), 1);
}

#[test]
fn test_too_many_errors_halts() {
    let mut input = String::from("Message ID,Last Name\n");
    for i in 0..4 {
        input.push_str(&format!("m{i},\n"));
    }
    let options = CsvReadOptions::default().with_max_errors(2);
    let result = read(&serializer(), &input, &options);
    assert!(result.report.is_none());
    assert!(result
        .errors()
        .any(|issue| issue.detail == IssueDetail::TooManyErrors));
}

#[test]
fn test_default_override() {
    let input = "Message ID,Last Name\nm1,Doe\n";
    let options = CsvReadOptions::default().with_default("patient_state", "NM");
    let result = read(&serializer(), input, &options);
    assert_eq!(result.report.expect("report").value(0, "patient_state"), "NM");
}

#[test]
fn test_unknown_schema_is_caller_error() {
    let err = serializer()
        .read_external("nope", "a\n1\n".as_bytes(), vec![], &CsvReadOptions::default(), None)
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown schema: nope");
}

#[test]
fn test_write_external_formats_columns() {
    let serializer = serializer();
    let input = "Message ID,Last Name,State,Result,Collected,Facility,Facility OID,Facility OID Type\n\
                 m1,\"Doe, Jr\",CA,not detected,1/5/2021,Lab,1.2.3,ISO\n";
    let report = read(&serializer, input, &CsvReadOptions::default())
        .report
        .expect("report");
    let mut out = Vec::new();
    serializer.write(&report, &mut out).expect("write");
    let text = String::from_utf8(out).expect("utf8");
    insta::assert_snapshot!(text.trim_end(), @"Message ID,Last Name,State,Result,Collected,Facility,Facility OID,Facility OID Type\nm1,\"Doe, Jr\",CA,Not detected,20210105,Lab,1.2.3,ISO");
    assert!(text.ends_with('\n'));
    assert!(!text.contains('\r'));
}

#[test]
fn test_write_internal_header_is_element_names() {
    let serializer = serializer();
    let report = Report::new(
        Arc::clone(serializer.metadata().schema("lab").expect("schema")),
        vec![vec![
            "m1".to_string(),
            "Doe".to_string(),
            "AZ".to_string(),
            "260373001".to_string(),
            "20210105".to_string(),
            "Lab^1.2.3^ISO".to_string(),
            String::new(),
        ]],
        vec![],
        None,
    )
    .expect("report");
    let mut out = Vec::new();
    serializer.write_internal(&report, &mut out).expect("write");
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "message_id,patient_last_name,patient_state,test_result,specimen_collection_date,\
         ordering_facility,summary\nm1,Doe,AZ,260373001,20210105,Lab^1.2.3^ISO,\n"
    );
}

// Decision table: one DATE element under every cardinality / blank / source combination.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Absent,
    Blank,
    Invalid,
    Valid,
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Row kept with this value and this many warnings.
    Value(&'static str, usize),
    /// Row dropped with one item-scoped error.
    RowError,
    /// No report, one report-scoped error.
    ReportError,
}

fn decide(cardinality: Cardinality, can_be_blank: bool, input: Input) -> Outcome {
    let mut element = Element::new("collected", ElementType::Date);
    element.cardinality = cardinality;
    element.can_be_blank = can_be_blank;
    if input != Input::Absent {
        element = element.with_csv(CsvField::new("Collected"));
    } else {
        element = element.with_csv(CsvField::new("Collected Elsewhere"));
    }
    let schema = Schema::new(
        "grid",
        "test",
        vec![
            Element::new("id", ElementType::Id)
                .required()
                .with_csv(CsvField::new("ID")),
            element,
        ],
    )
    .and_then(|schema| schema.with_tracking_element("id"))
    .expect("schema");
    let mut metadata = Metadata::new();
    metadata.add_schema(schema).expect("register");
    let serializer =
        CsvSerializer::new(Arc::new(metadata), Arc::new(MapperRegistry::with_builtins()));

    let input = match input {
        Input::Absent => "ID,Collected\nr1,2021-01-05\n".to_string(),
        Input::Blank => "ID,Collected\nr1,\n".to_string(),
        Input::Invalid => "ID,Collected\nr1,someday\n".to_string(),
        Input::Valid => "ID,Collected\nr1,2021-01-05\n".to_string(),
    };
    let result = serializer
        .read_external("grid", input.as_bytes(), vec![], &CsvReadOptions::default(), None)
        .expect("read");
    // The "Collected" header is unexpected when the element reads elsewhere.
    let unexpected = result
        .warnings()
        .filter(|issue| matches!(issue.detail, IssueDetail::UnexpectedHeader { .. }))
        .count();
    let warnings = result.warnings().count() - unexpected;
    match &result.report {
        None => {
            assert_eq!(result.errors().count(), 1);
            Outcome::ReportError
        }
        Some(report) if report.is_empty() => {
            assert_eq!(result.errors().count(), 1);
            assert_eq!(
                result.errors().next().and_then(|issue| issue.scope.tracking_id()),
                Some("r1")
            );
            Outcome::RowError
        }
        Some(report) => {
            assert_eq!(result.errors().count(), 0);
            let value = report.value(0, "collected");
            let value: &'static str = match value {
                "" => "",
                "20210105" => "20210105",
                other => panic!("unexpected value {other}"),
            };
            Outcome::Value(value, warnings)
        }
    }
}

#[test]
fn test_decision_table() {
    use Cardinality::{One, ZeroOrOne};
    let cases = [
        (One, false, Input::Absent, Outcome::ReportError),
        (One, true, Input::Absent, Outcome::ReportError),
        (ZeroOrOne, false, Input::Absent, Outcome::Value("", 1)),
        (ZeroOrOne, true, Input::Absent, Outcome::Value("", 1)),
        (One, false, Input::Blank, Outcome::RowError),
        (One, true, Input::Blank, Outcome::Value("", 0)),
        (ZeroOrOne, false, Input::Blank, Outcome::Value("", 0)),
        (ZeroOrOne, true, Input::Blank, Outcome::Value("", 0)),
        (One, false, Input::Invalid, Outcome::RowError),
        (One, true, Input::Invalid, Outcome::RowError),
        (ZeroOrOne, false, Input::Invalid, Outcome::Value("", 1)),
        (ZeroOrOne, true, Input::Invalid, Outcome::Value("", 1)),
        (One, false, Input::Valid, Outcome::Value("20210105", 0)),
        (One, true, Input::Valid, Outcome::Value("20210105", 0)),
        (ZeroOrOne, false, Input::Valid, Outcome::Value("20210105", 0)),
        (ZeroOrOne, true, Input::Valid, Outcome::Value("20210105", 0)),
    ];
    for (cardinality, can_be_blank, input, expected) in cases {
        assert_eq!(
            decide(cardinality, can_be_blank, input),
            expected,
            "{cardinality:?} can_be_blank={can_be_blank} {input:?}"
        );
    }
}

proptest! {
    #[test]
    fn internal_round_trip_is_lossless(
        rows in prop::collection::vec(prop::collection::vec("[ -~]{0,12}", 3), 0..8)
    ) {
        let schema = Schema::new(
            "plain",
            "test",
            vec![
                Element::new("a", ElementType::Text),
                Element::new("b", ElementType::Text),
                Element::new("c", ElementType::Text),
            ],
        )
        .expect("schema");
        let mut metadata = Metadata::new();
        let schema = metadata.add_schema(schema).expect("register");
        let serializer =
            CsvSerializer::new(Arc::new(metadata), Arc::new(MapperRegistry::new()));

        let report = Report::new(schema, rows.clone(), vec![], None).expect("report");
        let mut out = Vec::new();
        serializer.write_internal(&report, &mut out).expect("write");
        let read = serializer
            .read_internal("plain", out.as_slice(), vec![], None)
            .expect("read back");
        prop_assert_eq!(read.rows(), rows.as_slice());
    }
}
