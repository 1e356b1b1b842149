//! Writing reports as ORU^R01 messages.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use elr_map::{ElementValue, MapperRegistry};
use elr_model::normalize::{
    EiFields, HdFields, PhoneNumber, format_date, format_datetime, parse_date, parse_datetime,
    zip_five,
};
use elr_model::{
    AOE_FIELD, Element, ElementType, Metadata, PhoneNumberFormatting, Report, TranslationConfig,
    ValueSet,
};
use tracing::{debug, warn};

use crate::batch::{batch_footer, batch_header};
use crate::error::{Hl7Error, Result};
use crate::message::Message;
use crate::path::Hl7Path;
use crate::truncate::{CE_FIELDS, HD_FIELDS_UNIVERSAL, max_length, trim_and_truncate};

pub const HL7_VERSION: &str = "2.5.1";

pub const SOFTWARE_VENDOR: &str = "Centers for Disease Control and Prevention";
pub const SOFTWARE_PRODUCT: &str = "PRIME ReportStream";
const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Value set coding AOE question codes in OBX-3.
pub const AOE_QUESTION_VALUE_SET: &str = "covid-19/aoe";
/// Value set holding the `UNK` null flavor.
pub const UNKNOWN_VALUE_SET: &str = "hl70136";
/// Value set coding the units of the patient age AOE answer.
pub const AGE_UNITS_VALUE_SET: &str = "patient_age_units";

const UNKNOWN: &str = "UNK";
const ASKED_BUT_UNKNOWN: &str = "ASKU";

/// OBX(0) carries the test result; AOE answers follow it.
const FIRST_AOE_REP: usize = 1;

/// Length of XTN-4, the email address.
const EMAIL_MAX_LENGTH: usize = 199;

/// Country codes whose numbers fit XTN-6 and XTN-7.
const AREA_LOCAL_COUNTRIES: &[&str] = &["1", "52", "61"];

/// Date time written for fields converted to local time: no offset.
const LOCAL_DATETIME_PATTERN: &str = "%Y%m%d%H%M%S";

/// Reads and writes HL7 v2.5.1 ORU^R01 messages for a schema.
#[derive(Debug, Clone)]
pub struct Hl7Serializer {
    pub(crate) metadata: Arc<Metadata>,
    pub(crate) mappers: Arc<MapperRegistry>,
}

impl Hl7Serializer {
    pub fn new(metadata: Arc<Metadata>, mappers: Arc<MapperRegistry>) -> Self {
        Self { metadata, mappers }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Write a one-row report as a single message.
    ///
    /// # Errors
    ///
    /// Fails unless the report has exactly one row.
    pub fn write<W: Write>(&self, report: &Report, mut sink: W) -> Result<()> {
        if report.row_count() != 1 {
            return Err(Hl7Error::WrongRowCount {
                rows: report.row_count(),
            });
        }
        let message = self.create_message(report, 0)?;
        sink.write_all(message.as_bytes())?;
        Ok(())
    }

    /// Write every row as its own message inside an FHS/BHS envelope.
    pub fn write_batch<W: Write>(&self, report: &Report, mut sink: W) -> Result<()> {
        let default_config = TranslationConfig::default();
        let config = report
            .destination()
            .map_or(&default_config, |destination| &destination.translation);
        let header = batch_header(report, config, Utc::now().fixed_offset());
        sink.write_all(header.as_bytes())?;
        for row in 0..report.row_count() {
            let message = self.create_message(report, row)?;
            sink.write_all(message.as_bytes())?;
        }
        sink.write_all(batch_footer(report.row_count()).as_bytes())?;
        debug!(
            schema = report.schema().name(),
            messages = report.row_count(),
            "wrote HL7 batch"
        );
        Ok(())
    }

    /// Encoded message for `row`.
    pub fn create_message(&self, report: &Report, row: usize) -> Result<String> {
        Ok(self.build_message(report, row)?.encode())
    }

    /// Populate a message from `row`, applying the destination's translation
    /// settings.
    pub fn build_message(&self, report: &Report, row: usize) -> Result<Message> {
        let default_config = TranslationConfig::default();
        let config = report
            .destination()
            .map_or(&default_config, |destination| &destination.translation);
        let mut builder = MessageBuilder {
            report,
            row,
            config,
            metadata: &self.metadata,
            mappers: &self.mappers,
            message: Message::new(),
            aoe_sequence: FIRST_AOE_REP,
            nte_sequence: 0,
        };
        builder.set_literals()?;
        for element in report.schema().elements() {
            builder.write_element(element)?;
        }
        builder.apply_overrides()?;
        debug!(
            schema = report.schema().name(),
            row,
            segments = builder.message.segments().len(),
            "built HL7 message"
        );
        Ok(builder.message)
    }
}

/// Converts a normalized date time to the message form, passing through
/// values that do not parse (e.g. `UNK`).
fn message_datetime(value: &str) -> String {
    parse_datetime(value, None).map_or_else(|| value.to_string(), |dt| format_datetime(&dt))
}

fn is_unknown(value: &str) -> bool {
    value.eq_ignore_ascii_case(UNKNOWN) || value.eq_ignore_ascii_case(ASKED_BUT_UNKNOWN)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn obx(spec: &str, rep: usize) -> Result<Hl7Path> {
    Ok(Hl7Path::parse(spec)?.with_segment_rep(rep))
}

/// State for populating one message.
struct MessageBuilder<'a> {
    report: &'a Report,
    row: usize,
    config: &'a TranslationConfig,
    metadata: &'a Metadata,
    mappers: &'a MapperRegistry,
    message: Message,
    aoe_sequence: usize,
    nte_sequence: usize,
}

impl MessageBuilder<'_> {
    fn set(&mut self, spec: &str, value: impl Into<String>) -> Result<()> {
        let path = Hl7Path::parse(spec)?;
        self.message.set(&path, value);
        Ok(())
    }

    fn processing_id(&self) -> &'static str {
        if self.config.use_test_processing_mode {
            "T"
        } else {
            "P"
        }
    }

    fn set_literals(&mut self) -> Result<()> {
        let literals = [
            ("MSH-9-1", "ORU"),
            ("MSH-9-2", "R01"),
            ("MSH-9-3", "ORU_R01"),
            ("MSH-12", HL7_VERSION),
            ("MSH-15", "NE"),
            ("MSH-16", "NE"),
            ("MSH-17", "USA"),
            ("MSH-18", "UNICODE UTF-8"),
            ("MSH-19-1", "ENG"),
            ("MSH-19-2", "English"),
            ("MSH-19-3", "ISO"),
            ("SFT-1", SOFTWARE_VENDOR),
            ("SFT-2", SOFTWARE_VERSION),
            ("SFT-3", SOFTWARE_PRODUCT),
            ("SFT-4", SOFTWARE_VERSION),
            ("PID-1", "1"),
            ("ORC-1", "RE"),
            ("OBR-1", "1"),
            ("SPM-1", "1"),
            ("OBX-1", "1"),
            ("OBX-2", "CWE"),
            ("OBX-23-7", "XX"),
        ];
        for (spec, value) in literals {
            self.set(spec, value)?;
        }
        self.set("MSH-7", format_datetime(&self.report.created()))?;
        self.set("MSH-11", self.processing_id())
    }

    /// Row value, else the element default, trimmed.
    fn element_value(&self, element: &Element) -> String {
        let value = self.report.value(self.row, &element.name);
        let value = if value.trim().is_empty() {
            element.default_value().unwrap_or_default()
        } else {
            value
        };
        value.trim().to_string()
    }

    fn write_element(&mut self, element: &Element) -> Result<()> {
        let config = self.config;
        let primary = element.hl7_field.as_deref();
        if primary.is_none() && element.hl7_output_fields.is_empty() {
            return Ok(());
        }
        if element.hl7_output_fields.is_empty() && primary.is_some_and(|f| config.is_suppressed(f)) {
            return Ok(());
        }
        if element.is_aoe() && config.suppress_aoe {
            return Ok(());
        }
        let value = self.element_value(element);
        if is_unknown(&value) && config.blanks_unknown_for(&element.name) {
            return Ok(());
        }

        if !element.hl7_output_fields.is_empty() {
            for field in &element.hl7_output_fields {
                if config.is_suppressed(field) {
                    continue;
                }
                if primary.is_some() && element.is_table_lookup() {
                    self.write_table(element, field)?;
                } else {
                    let path = Hl7Path::parse(field)?;
                    self.set_component(element, field, &path, &value)?;
                }
            }
            return Ok(());
        }

        let Some(field) = primary else {
            return Ok(());
        };
        match field {
            AOE_FIELD => self.write_aoe(element, &value),
            "NTE-3" => {
                if !value.is_empty() {
                    self.set_note(&value)?;
                }
                Ok(())
            }
            "MSH-7" => self.set("MSH-7", format_datetime(&self.report.created())),
            "MSH-11" => self.set("MSH-11", self.processing_id()),
            _ if element.is_table_lookup() => self.write_table(element, field),
            _ => {
                let path = Hl7Path::parse(field)?;
                self.set_component(element, field, &path, &value)
            }
        }
    }

    /// Table elements take their value from their mapper over the row.
    fn write_table(&mut self, element: &Element, field: &str) -> Result<()> {
        let value = match self.mapped_value(element)? {
            Some(value) => value,
            None => self.element_value(element),
        };
        let path = Hl7Path::parse(field)?;
        self.set_component(element, field, &path, &value)
    }

    fn mapped_value(&self, element: &Element) -> Result<Option<String>> {
        let Some(name) = element.mapper_ref.as_deref() else {
            return Ok(None);
        };
        let mapper = self.mappers.get(name, &element.name)?;
        let names = mapper.value_names(element, &element.mapper_args)?;
        let schema = self.report.schema();
        let values: Vec<ElementValue<'_>> = names
            .iter()
            .filter_map(|name| {
                Some(ElementValue {
                    element: schema.find_element(name)?,
                    value: self.report.get_string(self.row, name)?,
                })
            })
            .collect();
        let mapped = mapper.apply(element, &element.mapper_args, &values, self.metadata)?;
        Ok(mapped.filter(|value| !value.trim().is_empty()))
    }

    /// Type-directed write of one value to `path`. `hl7_field` is the
    /// declared location used for length limits.
    fn set_component(
        &mut self,
        element: &Element,
        hl7_field: &str,
        path: &Hl7Path,
        value: &str,
    ) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        let metadata = self.metadata;
        match element.element_type {
            ElementType::IdClia => self.set_clia(hl7_field, path, value)?,
            ElementType::Hd => self.set_hd(hl7_field, path, value),
            ElementType::Ei => self.set_ei(hl7_field, path, value),
            ElementType::Code => {
                let value_set = metadata.element_value_set(element)?;
                self.set_code(value_set, path, value);
            }
            ElementType::Telephone => self.set_telephone(element, path, value)?,
            ElementType::Email => self.set_email(element, path, value)?,
            ElementType::PostalCode => self.message.set(path, zip_five(value)),
            ElementType::Date | ElementType::Datetime => {
                self.set_date_time(element, hl7_field, path, value);
            }
            _ => {
                let limit = max_length(hl7_field, value, self.config);
                self.message.set(path, trim_and_truncate(value, limit));
            }
        }
        Ok(())
    }

    /// CLIA number plus its `CLIA` qualifier after the value.
    fn set_clia(&mut self, hl7_field: &str, path: &Hl7Path, value: &str) -> Result<()> {
        let limit = max_length(hl7_field, value, self.config);
        self.message.set(path, trim_and_truncate(value, limit));
        if HD_FIELDS_UNIVERSAL.contains(&hl7_field) {
            self.message.set(&path.next_component(1)?, "CLIA");
        } else if CE_FIELDS.contains(&hl7_field) {
            self.message.set(&path.next_component(2)?, "CLIA");
        }
        Ok(())
    }

    fn set_hd(&mut self, hl7_field: &str, path: &Hl7Path, value: &str) {
        let limit = max_length(hl7_field, value, self.config);
        let Some(hd) = HdFields::parse(value) else {
            warn!(field = hl7_field, "value is not a hierarchic designator, writing as text");
            self.message.set(path, trim_and_truncate(value, limit));
            return;
        };
        match (&hd.universal_id, &hd.universal_id_system) {
            (Some(universal_id), Some(system)) => {
                let name_limit = if self.config.truncate_hd_namespace_ids {
                    max_length(&format!("{hl7_field}-1"), value, self.config).or(limit)
                } else {
                    limit
                };
                self.message
                    .set(&path.child(1), trim_and_truncate(&hd.name, name_limit));
                self.message.set(&path.child(2), universal_id);
                self.message.set(&path.child(3), system);
            }
            _ => self.message.set(path, trim_and_truncate(&hd.name, limit)),
        }
    }

    fn set_ei(&mut self, hl7_field: &str, path: &Hl7Path, value: &str) {
        let limit = max_length(hl7_field, value, self.config);
        let Some(ei) = EiFields::parse(value) else {
            warn!(field = hl7_field, "value is not an entity identifier, writing as text");
            self.message.set(path, trim_and_truncate(value, limit));
            return;
        };
        match (&ei.universal_id, &ei.universal_id_system) {
            (Some(universal_id), Some(system)) => {
                self.message
                    .set(&path.child(1), trim_and_truncate(&ei.name, limit));
                self.message
                    .set(&path.child(2), ei.namespace.clone().unwrap_or_default());
                self.message.set(&path.child(3), universal_id);
                self.message.set(&path.child(4), system);
            }
            _ => self.message.set(path, trim_and_truncate(&ei.name, limit)),
        }
    }

    /// Standards-coded values on a whole field become code, display, coding
    /// system and version. Anything else is written as the raw code.
    fn set_code(&mut self, value_set: Option<&ValueSet>, path: &Hl7Path, value: &str) {
        match value_set {
            Some(set) if set.system.is_standard() && path.is_field() => {
                let code = set.to_normalized_code(value).unwrap_or(value);
                self.message.set(&path.with_component(1), code);
                self.message.set(
                    &path.with_component(2),
                    set.to_display_from_code(code).unwrap_or_default(),
                );
                self.message.set(
                    &path.with_component(3),
                    set.to_system_from_code(code).unwrap_or_default(),
                );
                if let Some(version) = set.to_version_from_code(code) {
                    self.message.set(&path.with_component(7), version);
                }
            }
            _ => self.message.set(path, value),
        }
    }

    fn set_date_time(&mut self, element: &Element, hl7_field: &str, path: &Hl7Path, value: &str) {
        let truncated = trim_and_truncate(value, max_length(hl7_field, value, self.config));
        let formatted = if element.element_type == ElementType::Date {
            parse_date(&truncated, None).map(format_date)
        } else {
            parse_datetime(&truncated, None).map(|dt| format_datetime(&dt))
        };
        self.message.set(path, formatted.unwrap_or(truncated));
    }

    /// First repetition of `field` whose XTN-2 use code is empty.
    fn next_open_rep(&self, field: &Hl7Path) -> usize {
        let mut rep = 0;
        while !self
            .message
            .get(&field.clone().with_field_rep(rep).with_component(2))
            .is_empty()
        {
            rep += 1;
        }
        rep
    }

    /// Patient numbers go to the next open PID-13 repetition, ahead of any
    /// email already written there. Other numbers are work numbers at `path`.
    fn set_telephone(&mut self, element: &Element, path: &Hl7Path, value: &str) -> Result<()> {
        let Some(phone) = PhoneNumber::parse(value) else {
            warn!(element = %element.name, "skipping unparseable telephone number");
            return Ok(());
        };
        if !element.name.contains("patient") {
            self.set_xtn(path, &phone, "WPN");
            return Ok(());
        }
        let field = Hl7Path::parse("PID-13")?;
        let rep = self.next_open_rep(&field);
        if rep > 0 && self.message.get(&field.with_component(2)) == "NET" {
            let email = self.message.get(&field.with_component(4)).to_string();
            self.message.set(&field.with_component(4), "");
            self.set_xtn(&field, &phone, "PRN");
            self.set_email_at(&field.clone().with_field_rep(1), email);
        } else {
            self.set_xtn(&field.with_field_rep(rep), &phone, "PRN");
        }
        Ok(())
    }

    fn set_xtn(&mut self, path: &Hl7Path, phone: &PhoneNumber, use_code: &str) {
        let component_one = match self.config.phone_number_formatting {
            PhoneNumberFormatting::Standard => {
                let local = match phone.local.get(..3).zip(phone.local.get(3..)) {
                    Some((exchange, line)) if phone.local.len() == 7 => format!("{exchange}-{line}"),
                    _ => phone.local.clone(),
                };
                let extension = if phone.extension.is_empty() {
                    String::new()
                } else {
                    format!("X{}", phone.extension)
                };
                format!("({}){local}{extension}", phone.area_code)
            }
            PhoneNumberFormatting::OnlyDigitsInComponentOne => phone.area_local(),
            PhoneNumberFormatting::AreaLocalInComponentOne => {
                format!("({}){}", phone.area_code, phone.local)
            }
        };
        self.message.set(&path.with_component(1), component_one);
        self.message.set(&path.with_component(2), use_code);
        self.message.set(&path.with_component(3), "PH");
        self.message.set(&path.with_component(5), phone.country.as_str());
        if AREA_LOCAL_COUNTRIES.contains(&phone.country.as_str()) {
            self.message.set(&path.with_component(6), phone.area_code.as_str());
            self.message.set(&path.with_component(7), phone.local.as_str());
        } else {
            self.message.set(
                &path.with_component(12),
                format!("+{}{}{}", phone.country, phone.area_code, phone.local),
            );
        }
        if !phone.extension.is_empty() {
            self.message.set(&path.with_component(8), phone.extension.as_str());
        }
    }

    fn set_email(&mut self, element: &Element, path: &Hl7Path, value: &str) -> Result<()> {
        let address = trim_and_truncate(value, Some(EMAIL_MAX_LENGTH));
        if !element.name.contains("patient_email") {
            if path.is_field() {
                self.set_email_at(path, address);
            } else {
                self.message.set(path, address);
            }
            return Ok(());
        }
        let field = if self.config.use_pid14_for_patient_email {
            Hl7Path::parse("PID-14")?
        } else {
            let field = Hl7Path::parse("PID-13")?;
            let rep = self.next_open_rep(&field);
            field.with_field_rep(rep)
        };
        self.set_email_at(&field, address);
        Ok(())
    }

    fn set_email_at(&mut self, field: &Hl7Path, address: String) {
        self.message.set(&field.with_component(2), "NET");
        self.message.set(&field.with_component(3), "Internet");
        self.message.set(&field.with_component(4), address);
    }

    fn set_note(&mut self, value: &str) -> Result<()> {
        let rep = self.nte_sequence;
        self.nte_sequence += 1;
        let nte = |spec: &str| -> Result<Hl7Path> { Ok(Hl7Path::parse(spec)?.with_segment_rep(rep)) };
        self.message.set(&nte("NTE-1")?, (rep + 1).to_string());
        self.message.set(&nte("NTE-3")?, value);
        self.message.set(&nte("NTE-4-1")?, "RE");
        self.message.set(&nte("NTE-4-2")?, "Remark");
        self.message.set(&nte("NTE-4-3")?, "HL70364");
        self.message.set(&nte("NTE-4-7")?, HL7_VERSION);
        Ok(())
    }

    /// One OBX per answered question, numbered after the result observation.
    fn write_aoe(&mut self, element: &Element, value: &str) -> Result<()> {
        let answer = if !value.is_empty() {
            value
        } else if self.config.default_aoe_to_unknown && element.element_type != ElementType::Number
        {
            UNKNOWN
        } else {
            return Ok(());
        };
        let question = element
            .hl7_aoe_question
            .as_deref()
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| Hl7Error::MissingAoeQuestion {
                element: element.name.clone(),
            })?;
        let metadata = self.metadata;
        let report = self.report;
        let row = self.row;
        let unknown = answer == UNKNOWN;
        let units = if element.element_type == ElementType::Number && !unknown {
            if element.name != "patient_age" {
                return Err(Hl7Error::UnsupportedAoeNumber {
                    element: element.name.clone(),
                });
            }
            let units = report
                .get_string(row, &format!("{}_units", element.name))
                .ok_or_else(|| Hl7Error::MissingAoeUnits {
                    element: element.name.clone(),
                })?;
            Some(units)
        } else {
            None
        };

        let rep = self.aoe_sequence;
        self.aoe_sequence += 1;
        let value_type = match element.element_type {
            _ if unknown => "CWE",
            ElementType::Date => "DT",
            ElementType::Number => "NM",
            ElementType::Code => "CWE",
            _ => "ST",
        };
        self.message.set(&obx("OBX-1", rep)?, (rep + 1).to_string());
        self.message.set(&obx("OBX-2", rep)?, value_type);
        let questions = metadata.value_set(AOE_QUESTION_VALUE_SET)?;
        self.set_code(Some(questions), &obx("OBX-3", rep)?, question);

        let answer_path = obx("OBX-5", rep)?;
        if unknown {
            let nulls = metadata.value_set(UNKNOWN_VALUE_SET)?;
            self.set_code(Some(nulls), &answer_path, answer);
        } else if element.element_type == ElementType::Code {
            let value_set = metadata.element_value_set(element)?;
            self.set_code(value_set, &answer_path, answer);
        } else {
            self.set_component(element, "OBX-5", &answer_path, answer)?;
        }
        if let Some(units) = units {
            let unit_set = metadata.value_set(AGE_UNITS_VALUE_SET)?;
            self.set_code(Some(unit_set), &obx("OBX-6", rep)?, units);
        }

        let collected = report
            .get_string(row, "specimen_collection_date_time")
            .map(message_datetime)
            .unwrap_or_default();
        let result_date = report
            .get_string(row, "test_result_date")
            .map(|date| {
                if date.eq_ignore_ascii_case(UNKNOWN) {
                    date.to_string()
                } else {
                    message_datetime(date)
                }
            })
            .unwrap_or_default();
        self.message.set(
            &obx("OBX-11", rep)?,
            report.value(row, "observation_result_status"),
        );
        self.message.set(&obx("OBX-14", rep)?, collected);
        self.message.set(&obx("OBX-19", rep)?, result_date);
        self.message.set(&obx("OBX-23-7", rep)?, "XX");
        if !self.config.suppress_qst_for_aoe {
            self.message.set(&obx("OBX-29", rep)?, "QST");
        }

        // Performing organization fields repeat on every AOE observation.
        for spec in ["OBX-23-1", "OBX-24-1", "OBX-24-2", "OBX-24-3", "OBX-24-4"] {
            let value = report.get_string_by_hl7_field(row, spec).unwrap_or_default();
            let limit = max_length(spec, value, self.config);
            self.message.set(&obx(spec, rep)?, trim_and_truncate(value, limit));
        }
        let clia = report.value(row, "testing_lab_clia");
        self.message.set(&obx("OBX-23-10", rep)?, clia);
        self.message.set(&obx("OBX-15", rep)?, clia);
        if let Some(zip) = report.get_string_by_hl7_field(row, "OBX-24-5") {
            self.message.set(&obx("OBX-24-5", rep)?, format!("{zip:0>5}"));
        }
        self.message.set(
            &obx("OBX-24-9", rep)?,
            report.get_string_by_hl7_field(row, "OBX-24-9").unwrap_or_default(),
        );
        if let Some(assigner) = report.get_string(row, "testing_lab_id_assigner")
            && assigner.contains('^')
        {
            let assigning = obx("OBX-23-6", rep)?;
            for (index, part) in assigner.split('^').enumerate() {
                self.message.set(&assigning.with_subcomponent(index + 1), part);
            }
        }
        Ok(())
    }

    /// Final sweeps: suppression, local timestamps, reporting facility and
    /// literal replacements, in that order.
    fn apply_overrides(&mut self) -> Result<()> {
        let config = self.config;
        for field in &config.suppress_hl7_fields {
            self.message.set(&Hl7Path::parse(field)?, "");
        }

        for field in &config.convert_timestamp_to_date_time {
            let path = Hl7Path::parse(field)?;
            let converted = parse_datetime(self.message.get(&path), None)
                .map(|dt| dt.format(LOCAL_DATETIME_PATTERN).to_string());
            if let Some(converted) = converted {
                self.message.set(&path, converted);
            }
        }

        if let Some(name) = non_empty(config.reporting_facility_name.as_deref()) {
            self.set("MSH-4-1", name)?;
        }
        if let Some(id) = non_empty(config.reporting_facility_id.as_deref()) {
            self.set("MSH-4-2", id)?;
            if let Some(id_type) = non_empty(config.reporting_facility_id_type.as_deref()) {
                self.set("MSH-4-3", id_type)?;
            }
        }

        let observations = self.message.segment_count("OBX");
        for (field, replacement) in &config.replace_value {
            // Each comma-separated piece is a field reference or a literal.
            let value: String = replacement
                .split(',')
                .map(str::trim)
                .map(|piece| match Hl7Path::parse(piece) {
                    Ok(path) => self.message.get(&path).to_string(),
                    Err(_) => piece.to_string(),
                })
                .collect();
            let target = Hl7Path::parse(field)?;
            let reps = if target.segment == "OBX" { observations } else { 1 };
            for rep in 0..reps {
                let path = if reps > 1 {
                    target.clone().with_segment_rep(rep)
                } else {
                    target.clone()
                };
                if !self.message.get(&path).is_empty() {
                    self.message.set(&path, value.clone());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elr_model::{Destination, Schema, SetSystem, ValueSetValue};

    fn serializer(elements: Vec<Element>) -> (Hl7Serializer, Arc<Schema>) {
        let mut metadata = Metadata::new();
        metadata.add_value_set(
            ValueSet::new("covid-19/test_result", SetSystem::SnomedCt)
                .with_value(ValueSetValue::new("260373001", "Detected")),
        );
        let schema = metadata
            .add_schema(Schema::new("t", "covid-19", elements).expect("schema"))
            .expect("register");
        (
            Hl7Serializer::new(Arc::new(metadata), Arc::new(MapperRegistry::with_builtins())),
            schema,
        )
    }

    fn report(schema: &Arc<Schema>, row: &[&str], config: TranslationConfig) -> Report {
        let destination = Destination {
            organization: "az".to_string(),
            name: "elr".to_string(),
            translation: config,
        };
        Report::new(
            Arc::clone(schema),
            vec![row.iter().map(|v| (*v).to_string()).collect()],
            vec![],
            Some(Arc::new(destination)),
        )
        .expect("report")
    }

    fn get(message: &Message, spec: &str) -> String {
        message.get(&Hl7Path::parse(spec).expect("path")).to_string()
    }

    #[test]
    fn test_code_writes_coded_triplet() {
        let (serializer, schema) = serializer(vec![
            Element::new("test_result", ElementType::Code)
                .with_value_set("covid-19/test_result")
                .with_hl7("OBX-5"),
        ]);
        let report = report(&schema, &["260373001"], TranslationConfig::default());
        let message = serializer.build_message(&report, 0).expect("message");
        assert_eq!(get(&message, "OBX-5-1"), "260373001");
        assert_eq!(get(&message, "OBX-5-2"), "Detected");
        assert_eq!(get(&message, "OBX-5-3"), "SCT");
    }

    #[test]
    fn test_hd_truncates_namespace() {
        let (serializer, schema) = serializer(vec![
            Element::new("sending_application", ElementType::Hd).with_hl7("MSH-3"),
        ]);
        let config = TranslationConfig {
            truncate_hd_namespace_ids: true,
            ..TranslationConfig::default()
        };
        let report = report(&schema, &["A very long application name^1.2.3^ISO"], config);
        let message = serializer.build_message(&report, 0).expect("message");
        assert_eq!(get(&message, "MSH-3-1"), "A very long applicat");
        assert_eq!(get(&message, "MSH-3-2"), "1.2.3");
        assert_eq!(get(&message, "MSH-3-3"), "ISO");
    }

    #[test]
    fn test_clia_qualifier() {
        let (serializer, schema) = serializer(vec![
            Element::new("testing_lab_clia", ElementType::IdClia).with_hl7_outputs(&["MSH-4-2", "OBX-15-1"]),
        ]);
        let report = report(&schema, &["10D0876999"], TranslationConfig::default());
        let message = serializer.build_message(&report, 0).expect("message");
        assert_eq!(get(&message, "MSH-4-2"), "10D0876999");
        assert_eq!(get(&message, "MSH-4-3"), "CLIA");
        assert_eq!(get(&message, "OBX-15-1"), "10D0876999");
        assert_eq!(get(&message, "OBX-15-3"), "CLIA");
    }

    #[test]
    fn test_processing_id() {
        let (serializer, schema) = serializer(vec![Element::new("x", ElementType::Text)]);
        let config = TranslationConfig {
            use_test_processing_mode: true,
            ..TranslationConfig::default()
        };
        let message = serializer
            .build_message(&report(&schema, &["a"], config), 0)
            .expect("message");
        assert_eq!(get(&message, "MSH-11"), "T");
        assert_eq!(get(&message, "MSH-9-3"), "ORU_R01");
        assert_eq!(get(&message, "MSH-12"), HL7_VERSION);
    }

    #[test]
    fn test_unknown_blanked_for_configured_elements() {
        let (serializer, schema) = serializer(vec![
            Element::new("patient_ethnicity", ElementType::Text).with_hl7("PID-22"),
        ]);
        let config = TranslationConfig {
            use_blank_instead_of_unknown: vec!["patient_ethnicity".to_string()],
            ..TranslationConfig::default()
        };
        let message = serializer
            .build_message(&report(&schema, &["UNK"], config), 0)
            .expect("message");
        assert_eq!(get(&message, "PID-22"), "");
    }
}
