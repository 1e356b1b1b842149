//! Matching a CSV header row against a schema.

use std::collections::{HashMap, HashSet};

use elr_model::{IssueDetail, Schema};

/// Per-read mapping from schema elements to physical columns.
#[derive(Debug, Clone)]
pub struct HeaderPlan {
    /// For each element, the column index of every CSV sub-field, or `None`
    /// when the element cannot be sourced from this file.
    pub sources: Vec<Option<Vec<usize>>>,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
    pub unexpected: Vec<String>,
}

impl HeaderPlan {
    pub fn new(schema: &Schema, headers: &[String]) -> Self {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), index))
            .collect();

        let sources = schema
            .elements()
            .iter()
            .map(|element| {
                if element.csv_fields.is_empty() {
                    return None;
                }
                element
                    .csv_fields
                    .iter()
                    .map(|field| positions.get(field.name.as_str()).copied())
                    .collect::<Option<Vec<_>>>()
            })
            .collect();

        let missing = |names: Vec<&str>| -> Vec<String> {
            names
                .into_iter()
                .filter(|name| !positions.contains_key(name))
                .map(str::to_string)
                .collect()
        };
        let missing_required = missing(schema.required_csv_headers());
        let missing_optional = missing(schema.optional_csv_headers());

        let known: HashSet<&str> = schema
            .csv_fields()
            .map(|(_, field)| field.name.as_str())
            .collect();
        let unexpected = headers
            .iter()
            .filter(|header| !known.contains(header.as_str()))
            .cloned()
            .collect();

        Self {
            sources,
            missing_required,
            missing_optional,
            unexpected,
        }
    }

    /// Report-scoped errors; any of these make the file unusable.
    pub fn errors(&self) -> Vec<IssueDetail> {
        self.missing_required
            .iter()
            .map(|header| IssueDetail::MissingRequiredHeader {
                header: header.clone(),
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<IssueDetail> {
        let missing = self
            .missing_optional
            .iter()
            .map(|header| IssueDetail::MissingOptionalHeader {
                header: header.clone(),
            });
        let unexpected = self
            .unexpected
            .iter()
            .map(|header| IssueDetail::UnexpectedHeader {
                header: header.clone(),
            });
        missing.chain(unexpected).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elr_model::{CsvField, Element, ElementType};

    fn schema() -> Schema {
        Schema::new(
            "s",
            "t",
            vec![
                Element::new("id", ElementType::Id)
                    .required()
                    .with_csv(CsvField::new("ID")),
                Element::new("state", ElementType::Text)
                    .with_default("AZ")
                    .with_csv(CsvField::new("State")),
                Element::new("facility", ElementType::Hd)
                    .with_csv(CsvField::new("Facility").with_format("$hdName"))
                    .with_csv(CsvField::new("Facility OID").with_format("$hdUniversalId")),
                Element::new("derived", ElementType::Text),
            ],
        )
        .expect("schema")
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn test_plan_sources() {
        let plan = HeaderPlan::new(&schema(), &headers(&["Facility OID", "ID", "Facility"]));
        assert_eq!(plan.sources[0], Some(vec![1]));
        assert_eq!(plan.sources[1], None);
        assert_eq!(plan.sources[2], Some(vec![2, 0]));
        assert_eq!(plan.sources[3], None);
        assert!(plan.errors().is_empty());
        assert_eq!(
            plan.warnings(),
            vec![IssueDetail::MissingOptionalHeader {
                header: "State".to_string()
            }]
        );
    }

    #[test]
    fn test_partial_composite_is_not_a_source() {
        let plan = HeaderPlan::new(&schema(), &headers(&["ID", "Facility"]));
        assert_eq!(plan.sources[2], None);
        assert_eq!(plan.missing_optional, vec!["State", "Facility OID"]);
    }

    #[test]
    fn test_missing_required_and_unexpected() {
        let plan = HeaderPlan::new(&schema(), &headers(&["State", "Extra"]));
        assert_eq!(
            plan.errors(),
            vec![IssueDetail::MissingRequiredHeader {
                header: "ID".to_string()
            }]
        );
        assert!(plan.warnings().contains(&IssueDetail::UnexpectedHeader {
            header: "Extra".to_string()
        }));
    }
}
