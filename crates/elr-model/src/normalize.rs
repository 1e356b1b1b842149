//! Parsing helpers behind element normalization.
//!
//! Normalized forms:
//! - date: `yyyyMMdd`
//! - date time: `yyyyMMddHHmmss+zzzz`, naive inputs taken as UTC
//! - telephone: `areaLocal:country:extension`
//! - HD: `name^universalId^universalIdType`
//! - EI: `name^namespace^universalId^universalIdType`

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

pub const DATE_PATTERN: &str = "%Y%m%d";
pub const DATETIME_PATTERN: &str = "%Y%m%d%H%M%S%z";

/// Human-readable target formats used in error messages.
pub const DATE_DISPLAY_FORMAT: &str = "yyyyMMdd";
pub const DATETIME_DISPLAY_FORMAT: &str = "yyyyMMddHHmmssZ";

const DATE_INPUTS: &[&str] = &[
    "%Y%m%d", "%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y", "%m/%d/%y",
];

const OFFSET_DATETIME_INPUTS: &[&str] = &[
    "%Y%m%d%H%M%S%z",
    "%Y%m%d%H%M%z",
    "%Y%m%d%H%M%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
];

const NAIVE_DATETIME_INPUTS: &[&str] = &[
    "%Y%m%d%H%M%S",
    "%Y%m%d%H%M%S%.f",
    "%Y%m%d%H%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Trailing extension: `x123`, `ext. 123`, `extension 123`.
static EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:x|ext\.?|extension)\s*(\d+)\s*$").expect("Invalid extension regex")
});

/// US zip or zip+4.
static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(?:-?\d{4})?$").expect("Invalid postal code regex"));

/// Convert a Java-style date pattern (`yyyy-MM-dd HH:mm`) into a chrono pattern.
pub fn java_to_chrono_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        let token = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', _) => Some("%m"),
            ('d', _) => Some("%d"),
            ('H', _) => Some("%H"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            ('S', _) => Some("%3f"),
            ('Z' | 'X' | 'x', _) => Some("%z"),
            _ => None,
        };
        match token {
            Some(token) => out.push_str(token),
            None => {
                for _ in 0..run {
                    if c == '%' {
                        out.push_str("%%");
                    } else if c != '\'' {
                        out.push(c);
                    }
                }
            }
        }
        i += run;
    }
    out
}

/// Parse a date in any accepted layout, or with an explicit Java-style pattern.
pub fn parse_date(value: &str, pattern: Option<&str>) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(pattern) = pattern {
        let chrono = java_to_chrono_pattern(pattern);
        if let Ok(date) = NaiveDate::parse_from_str(value, &chrono) {
            return Some(date);
        }
    }
    for layout in DATE_INPUTS {
        if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
            return Some(date);
        }
    }
    // A timestamp given for a date-only field keeps its date part.
    parse_datetime(value, None).map(|dt| dt.date_naive())
}

/// Parse a date time in any accepted layout. Date-only input is midnight UTC.
pub fn parse_datetime(value: &str, pattern: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(pattern) = pattern {
        let chrono = java_to_chrono_pattern(pattern);
        if let Ok(dt) = DateTime::parse_from_str(value, &chrono) {
            return Some(dt);
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, &chrono) {
            return Some(as_utc(naive));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    for layout in OFFSET_DATETIME_INPUTS {
        if let Ok(dt) = DateTime::parse_from_str(value, layout) {
            return Some(dt);
        }
    }
    for layout in NAIVE_DATETIME_INPUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(as_utc(naive));
        }
    }
    for layout in DATE_INPUTS {
        if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
            return date.and_hms_opt(0, 0, 0).map(as_utc);
        }
    }
    None
}

fn as_utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_PATTERN).to_string()
}

pub fn format_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.format(DATETIME_PATTERN).to_string()
}

/// A telephone number split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub area_code: String,
    pub local: String,
    pub country: String,
    pub extension: String,
}

impl PhoneNumber {
    /// Parse free-form input (`(555) 555-5555 x12`, `+1 555 555 5555`) or the
    /// normalized `areaLocal:country:extension` form.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.contains(':') {
            return Self::parse_normalized(value);
        }
        let (number, extension) = match EXTENSION.captures(value) {
            Some(caps) => {
                let whole = caps.get(0).map_or(value.len(), |m| m.start());
                let ext = caps.get(1).map_or("", |m| m.as_str());
                (&value[..whole], ext.to_string())
            }
            None => (value, String::new()),
        };
        let digits: String = number.chars().filter(char::is_ascii_digit).collect();
        let national = match digits.len() {
            10 => digits.as_str(),
            11 if digits.starts_with('1') => &digits[1..],
            _ => return None,
        };
        Some(Self {
            area_code: national[..3].to_string(),
            local: national[3..].to_string(),
            country: "1".to_string(),
            extension,
        })
    }

    fn parse_normalized(value: &str) -> Option<Self> {
        let mut parts = value.split(':');
        let area_local = parts.next()?.trim();
        let country = parts.next().unwrap_or("1").trim();
        let extension = parts.next().unwrap_or("").trim();
        if area_local.len() != 10 || !area_local.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            area_code: area_local[..3].to_string(),
            local: area_local[3..].to_string(),
            country: if country.is_empty() { "1" } else { country }.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn area_local(&self) -> String {
        format!("{}{}", self.area_code, self.local)
    }

    pub fn to_normalized(&self) -> String {
        format!("{}:{}:{}", self.area_local(), self.country, self.extension)
    }

    /// `+15555555555` style.
    pub fn to_e164(&self) -> String {
        format!("+{}{}", self.country, self.area_local())
    }
}

pub fn is_postal_code(value: &str) -> bool {
    POSTAL_CODE.is_match(value.trim())
}

/// First five digits of a US zip code.
pub fn zip_five(value: &str) -> String {
    let value = value.trim();
    value.chars().take(5).collect()
}

/// Hierarchic designator: a namespace name with an optional universal id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HdFields {
    pub name: String,
    pub universal_id: Option<String>,
    pub universal_id_system: Option<String>,
}

impl HdFields {
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split('^').collect();
        match parts.as_slice() {
            [name] => Some(Self {
                name: (*name).to_string(),
                ..Self::default()
            }),
            [name, universal_id, system] => Some(Self {
                name: (*name).to_string(),
                universal_id: non_empty(universal_id),
                universal_id_system: non_empty(system),
            }),
            _ => None,
        }
    }

    pub fn to_normalized(&self) -> String {
        match (&self.universal_id, &self.universal_id_system) {
            (None, None) => self.name.clone(),
            (id, system) => format!(
                "{}^{}^{}",
                self.name,
                id.as_deref().unwrap_or(""),
                system.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Entity identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EiFields {
    pub name: String,
    pub namespace: Option<String>,
    pub universal_id: Option<String>,
    pub universal_id_system: Option<String>,
}

impl EiFields {
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split('^').collect();
        if parts.is_empty() || parts.len() > 4 {
            return None;
        }
        Some(Self {
            name: parts[0].to_string(),
            namespace: parts.get(1).and_then(|p| non_empty(p)),
            universal_id: parts.get(2).and_then(|p| non_empty(p)),
            universal_id_system: parts.get(3).and_then(|p| non_empty(p)),
        })
    }

    pub fn to_normalized(&self) -> String {
        if self.namespace.is_none() && self.universal_id.is_none() && self.universal_id_system.is_none()
        {
            return self.name.clone();
        }
        format!(
            "{}^{}^{}^{}",
            self.name,
            self.namespace.as_deref().unwrap_or(""),
            self.universal_id.as_deref().unwrap_or(""),
            self.universal_id_system.as_deref().unwrap_or("")
        )
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
