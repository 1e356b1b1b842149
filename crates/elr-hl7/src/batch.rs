//! FHS/BHS batch envelope around a run of messages.
//!
//! The envelope is written by hand: it is not itself a parseable message.

use chrono::{DateTime, FixedOffset};
use elr_model::normalize::{DATETIME_PATTERN, HdFields};
use elr_model::{Report, TranslationConfig};

use crate::encoding::{Delimiters, SEGMENT_DELIMITER};
use crate::truncate::{HD_TRUNCATION_LIMIT, trim_and_truncate, truncation_limit_with_encoding};

const ENVELOPE_SEGMENTS: &[&str] = &["FHS", "BHS", "BTS", "FTS"];

/// FHS and BHS segments naming the sender and receiver of `report`.
///
/// Applications and facilities come from the first row unless the receiver
/// configuration overrides them.
pub fn batch_header(
    report: &Report,
    config: &TranslationConfig,
    now: DateTime<FixedOffset>,
) -> String {
    let sending_application = report.value(0, "sending_application");
    let sending_facility = report
        .get_string(0, "sending_facility")
        .unwrap_or(sending_application);
    let receiving_application = configured_hd(
        config.receiving_application_name.as_deref(),
        config.receiving_application_oid.as_deref(),
    )
    .unwrap_or_else(|| report.value(0, "receiving_application").to_string());
    let receiving_facility = configured_hd(
        config.receiving_facility_name.as_deref(),
        config.receiving_facility_oid.as_deref(),
    )
    .unwrap_or_else(|| report.value(0, "receiving_facility").to_string());

    let truncate = config.truncate_hd_namespace_ids;
    let fields = [
        format_hd(sending_application, truncate),
        format_hd(sending_facility, truncate),
        format_hd(&receiving_application, truncate),
        format_hd(&receiving_facility, truncate),
        now.format(DATETIME_PATTERN).to_string(),
    ]
    .join("|");
    let encoding = Delimiters::default().encoding_characters();
    let mut header = String::new();
    for segment in ["FHS", "BHS"] {
        header.push_str(&format!("{segment}|{encoding}|{fields}{SEGMENT_DELIMITER}"));
    }
    header
}

/// BTS with the message count and the FTS trailer.
pub fn batch_footer(count: usize) -> String {
    format!("BTS|{count}{SEGMENT_DELIMITER}FTS|1{SEGMENT_DELIMITER}")
}

fn configured_hd(name: Option<&str>, oid: Option<&str>) -> Option<String> {
    let name = name.filter(|name| !name.is_empty())?;
    Some(match oid.filter(|oid| !oid.is_empty()) {
        Some(oid) => format!("{name}^{oid}^ISO"),
        None => name.to_string(),
    })
}

/// `name^universalId^system` with escaped parts, the name cut to the HD
/// namespace limit when truncation is on.
fn format_hd(value: &str, truncate: bool) -> String {
    let delimiters = Delimiters::default();
    let limit = truncate.then(|| truncation_limit_with_encoding(value, HD_TRUNCATION_LIMIT));
    let Some(hd) = HdFields::parse(value) else {
        return delimiters.escape(&trim_and_truncate(value, limit));
    };
    let name = delimiters.escape(&trim_and_truncate(&hd.name, limit));
    match (&hd.universal_id, &hd.universal_id_system) {
        (None, None) => name,
        (id, system) => format!(
            "{name}^{}^{}",
            delimiters.escape(id.as_deref().unwrap_or_default()),
            delimiters.escape(system.as_deref().unwrap_or_default())
        ),
    }
}

/// Split batch text into the text of each message.
///
/// Line endings are normalized, envelope segments and blank lines dropped,
/// and every MSH starts a new message.
pub fn split_batch(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\r").replace('\n', "\r");
    let mut messages = Vec::new();
    let mut current = String::new();
    for line in text.split(SEGMENT_DELIMITER) {
        if line.trim().is_empty() || ENVELOPE_SEGMENTS.iter().any(|name| line.starts_with(name)) {
            continue;
        }
        if line.starts_with("MSH") && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push(SEGMENT_DELIMITER);
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}
