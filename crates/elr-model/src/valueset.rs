//! Value sets: code tables within one coding system.
//!
//! Lookups are case-insensitive on the code and always answer with the
//! canonical spelling stored in the set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Coding system governing a value set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetSystem {
    Hl7,
    Loinc,
    SnomedCt,
    Ucum,
    Iso,
    Fhir,
    #[default]
    Local,
}

impl SetSystem {
    /// Whether codes from this system are written as coded triplets in HL7.
    pub fn is_standard(self) -> bool {
        matches!(
            self,
            Self::Hl7 | Self::Loinc | Self::SnomedCt | Self::Ucum | Self::Iso
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hl7 => "HL7",
            Self::Loinc => "LOINC",
            Self::SnomedCt => "SNOMED_CT",
            Self::Ucum => "UCUM",
            Self::Iso => "ISO",
            Self::Fhir => "FHIR",
            Self::Local => "LOCAL",
        }
    }
}

/// One code in a value set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueSetValue {
    pub code: String,
    pub display: Option<String>,
    pub version: Option<String>,
    /// Older code this entry supersedes; readers map it onto `code`.
    pub replaces: Option<String>,
}

impl ValueSetValue {
    pub fn new(code: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display: Some(display.into()),
            ..Self::default()
        }
    }
}

/// A named table of codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ValueSetDefinition", into = "ValueSetDefinition")]
pub struct ValueSet {
    pub name: String,
    pub system: SetSystem,
    /// Table identifier, e.g. `HL70136`.
    pub reference: Option<String>,
    pub version: Option<String>,
    values: Vec<ValueSetValue>,
    /// Uppercase code or replaced code -> index into `values`.
    by_code: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ValueSetDefinition {
    name: String,
    system: SetSystem,
    reference: Option<String>,
    version: Option<String>,
    values: Vec<ValueSetValue>,
}

impl From<ValueSetDefinition> for ValueSet {
    fn from(def: ValueSetDefinition) -> Self {
        let mut set = ValueSet::new(def.name, def.system);
        set.reference = def.reference;
        set.version = def.version;
        for value in def.values {
            set.add_value(value);
        }
        set
    }
}

impl From<ValueSet> for ValueSetDefinition {
    fn from(set: ValueSet) -> Self {
        Self {
            name: set.name,
            system: set.system,
            reference: set.reference,
            version: set.version,
            values: set.values,
        }
    }
}

impl ValueSet {
    pub fn new(name: impl Into<String>, system: SetSystem) -> Self {
        Self {
            name: name.into(),
            system,
            reference: None,
            version: None,
            values: Vec::new(),
            by_code: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: ValueSetValue) -> Self {
        self.add_value(value);
        self
    }

    pub fn add_value(&mut self, value: ValueSetValue) {
        let index = self.values.len();
        if let Some(replaced) = &value.replaces {
            self.by_code.entry(replaced.to_uppercase()).or_insert(index);
        }
        self.by_code.insert(value.code.to_uppercase(), index);
        self.values.push(value);
    }

    pub fn values(&self) -> &[ValueSetValue] {
        &self.values
    }

    fn find(&self, code: &str) -> Option<&ValueSetValue> {
        self.by_code
            .get(&code.trim().to_uppercase())
            .and_then(|index| self.values.get(*index))
    }

    pub fn is_valid_code(&self, code: &str) -> bool {
        self.find(code).is_some()
    }

    /// Canonical code for `code`, following replacements.
    pub fn to_normalized_code(&self, code: &str) -> Option<&str> {
        self.find(code).map(|value| value.code.as_str())
    }

    pub fn to_display_from_code(&self, code: &str) -> Option<&str> {
        self.find(code).and_then(|value| value.display.as_deref())
    }

    pub fn to_code_from_display(&self, display: &str) -> Option<&str> {
        let wanted = display.trim();
        self.values
            .iter()
            .find(|value| {
                value
                    .display
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(wanted))
            })
            .map(|value| value.code.as_str())
    }

    /// Coding-system identifier written next to a code (HL7 CWE-3).
    pub fn to_system_from_code(&self, code: &str) -> Option<String> {
        self.find(code)?;
        let system = match self.system {
            SetSystem::Hl7 => self
                .reference
                .clone()
                .unwrap_or_else(|| "HL7".to_string()),
            SetSystem::Loinc => "LN".to_string(),
            SetSystem::SnomedCt => "SCT".to_string(),
            SetSystem::Ucum => "UCUM".to_string(),
            SetSystem::Iso => "ISO3166".to_string(),
            SetSystem::Fhir => "FHIR".to_string(),
            SetSystem::Local => "L".to_string(),
        };
        Some(system)
    }

    /// Code-specific version, falling back to the set's version.
    pub fn to_version_from_code(&self, code: &str) -> Option<&str> {
        let value = self.find(code)?;
        value.version.as_deref().or(self.version.as_deref())
    }
}
