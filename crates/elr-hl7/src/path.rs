//! Addressing values inside a message.
//!
//! Paths read `SEG[(rep)]-field[(rep)][-component[-subcomponent]]`, e.g.
//! `PID-13(1)-4` or `OBX(2)-5-1`. Repetition indexes are zero-based; field,
//! component and subcomponent numbers are one-based as in the HL7 tables.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Hl7Error, Result};

static PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9]{2})(?:\((\d+)\))?-(\d+)(?:\((\d+)\))?(?:-(\d+)(?:-(\d+))?)?$")
        .expect("Invalid HL7 path regex")
});

/// A parsed HL7 location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hl7Path {
    pub segment: String,
    pub segment_rep: usize,
    pub field: usize,
    pub field_rep: usize,
    pub component: Option<usize>,
    pub subcomponent: Option<usize>,
}

impl Hl7Path {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || Hl7Error::InvalidPath {
            path: spec.to_string(),
        };
        let caps = PATH.captures(spec.trim()).ok_or_else(invalid)?;
        let number = |index: usize| -> Result<Option<usize>> {
            caps.get(index)
                .map(|m| m.as_str().parse::<usize>().map_err(|_| invalid()))
                .transpose()
        };
        let field = number(3)?.ok_or_else(invalid)?;
        let component = number(5)?;
        let subcomponent = number(6)?;
        if field == 0 || component == Some(0) || subcomponent == Some(0) {
            return Err(invalid());
        }
        Ok(Self {
            segment: caps[1].to_string(),
            segment_rep: number(2)?.unwrap_or(0),
            field,
            field_rep: number(4)?.unwrap_or(0),
            component,
            subcomponent,
        })
    }

    /// Whether the path stops at the field, with no component given.
    pub fn is_field(&self) -> bool {
        self.component.is_none()
    }

    /// One-based component, defaulting to the first.
    pub fn component_number(&self) -> usize {
        self.component.unwrap_or(1)
    }

    /// One-based subcomponent, defaulting to the first.
    pub fn subcomponent_number(&self) -> usize {
        self.subcomponent.unwrap_or(1)
    }

    #[must_use]
    pub fn with_segment_rep(mut self, rep: usize) -> Self {
        self.segment_rep = rep;
        self
    }

    #[must_use]
    pub fn with_field_rep(mut self, rep: usize) -> Self {
        self.field_rep = rep;
        self
    }

    /// Component `component` of this field.
    #[must_use]
    pub fn with_component(&self, component: usize) -> Self {
        Self {
            component: Some(component),
            subcomponent: None,
            ..self.clone()
        }
    }

    /// Subcomponent `subcomponent` of this component.
    #[must_use]
    pub fn with_subcomponent(&self, subcomponent: usize) -> Self {
        Self {
            component: Some(self.component_number()),
            subcomponent: Some(subcomponent),
            ..self.clone()
        }
    }

    /// Part `n` one level below this path: a component of a field, else a
    /// subcomponent.
    #[must_use]
    pub fn child(&self, n: usize) -> Self {
        if self.is_field() {
            self.with_component(n)
        } else {
            self.with_subcomponent(n)
        }
    }

    /// The position `increment` steps after this one at the innermost level
    /// given: the subcomponent if present, else the component.
    pub fn next_component(&self, increment: usize) -> Result<Self> {
        let mut next = self.clone();
        match (self.component, self.subcomponent) {
            (_, Some(sub)) => next.subcomponent = Some(sub + increment),
            (Some(component), None) => next.component = Some(component + increment),
            (None, None) => {
                return Err(Hl7Error::NotAComponent {
                    path: self.to_string(),
                });
            }
        }
        Ok(next)
    }
}

impl fmt::Display for Hl7Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment)?;
        if self.segment_rep > 0 {
            write!(f, "({})", self.segment_rep)?;
        }
        write!(f, "-{}", self.field)?;
        if self.field_rep > 0 {
            write!(f, "({})", self.field_rep)?;
        }
        if let Some(component) = self.component {
            write!(f, "-{component}")?;
        }
        if let Some(subcomponent) = self.subcomponent {
            write!(f, "-{subcomponent}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_path() {
        let path = Hl7Path::parse("OBX(2)-5(1)-3-2").expect("path");
        assert_eq!(path.segment, "OBX");
        assert_eq!(path.segment_rep, 2);
        assert_eq!(path.field, 5);
        assert_eq!(path.field_rep, 1);
        assert_eq!(path.component, Some(3));
        assert_eq!(path.subcomponent, Some(2));
        assert_eq!(path.to_string(), "OBX(2)-5(1)-3-2");
    }

    #[test]
    fn test_parse_defaults() {
        let path = Hl7Path::parse("PID-5").expect("path");
        assert!(path.is_field());
        assert_eq!(path.segment_rep, 0);
        assert_eq!(path.component_number(), 1);
        assert_eq!(path.subcomponent_number(), 1);
        assert_eq!(path.to_string(), "PID-5");
    }

    #[test]
    fn test_invalid_paths() {
        for spec in ["AOE", "pid-5", "PID", "PID-0", "PID-5-0", "PID-5-1-2-3", "PID-x"] {
            assert!(Hl7Path::parse(spec).is_err(), "{spec}");
        }
    }

    #[test]
    fn test_next_component() {
        let path = Hl7Path::parse("MSH-4-2").expect("path");
        assert_eq!(path.next_component(1).expect("next").to_string(), "MSH-4-3");
        let path = Hl7Path::parse("PID-3-4-2").expect("path");
        assert_eq!(path.next_component(1).expect("next").to_string(), "PID-3-4-3");
        let path = Hl7Path::parse("OBX-15").expect("path");
        assert!(path.next_component(2).is_err());
    }

    #[test]
    fn test_child() {
        let path = Hl7Path::parse("OBX(1)-5").expect("path");
        assert_eq!(path.child(2).to_string(), "OBX(1)-5-2");
        let path = Hl7Path::parse("PID-3-4").expect("path");
        assert_eq!(path.child(3).to_string(), "PID-3-4-3");
    }
}
