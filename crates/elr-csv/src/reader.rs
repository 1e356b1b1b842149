//! Reading external and internal CSV into reports.

use std::io::Read;
use std::sync::Arc;

use csv::ReaderBuilder;
use elr_map::MapperRegistry;
use elr_model::{
    Destination, IssueDetail, IssueLog, IssueScope, IssueSeverity, Metadata, ReadResult, Report,
    Source,
};
use tracing::{debug, warn};

use crate::error::{CsvError, CsvParseFailure, Result};
use crate::header::HeaderPlan;
use crate::options::CsvReadOptions;
use crate::resolve::{ResolveContext, RowIssue, first_pass, second_pass};
use crate::table::{TableFailure, normalize_header, read_table};

/// Reads and writes schema-driven CSV.
#[derive(Debug, Clone)]
pub struct CsvSerializer {
    metadata: Arc<Metadata>,
    mappers: Arc<MapperRegistry>,
}

impl CsvSerializer {
    pub fn new(metadata: Arc<Metadata>, mappers: Arc<MapperRegistry>) -> Self {
        Self { metadata, mappers }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Parse sender CSV into a report.
    ///
    /// Malformed input yields a result with no report. Row-level problems are
    /// logged against the row's tracking id and drop only that row.
    ///
    /// # Errors
    ///
    /// Fails for an unknown schema or a schema referencing unknown mappers or
    /// value sets.
    pub fn read_external<R: Read>(
        &self,
        schema_name: &str,
        input: R,
        sources: Vec<Source>,
        options: &CsvReadOptions,
        destination: Option<Arc<Destination>>,
    ) -> Result<ReadResult> {
        let schema = Arc::clone(self.metadata.schema(schema_name)?);
        self.mappers.validate(&schema)?;

        let table = match read_table(input, options.max_items, options.max_columns) {
            Ok(table) => table,
            Err(failure) => {
                let detail = match failure {
                    TableFailure::Parse(parse) => IssueDetail::from(parse),
                    TableFailure::TooManyRows { rows } => IssueDetail::RowLimitExceeded {
                        rows,
                        max: options.max_items,
                    },
                    TableFailure::TooManyColumns => IssueDetail::ColumnLimitExceeded {
                        max: options.max_columns,
                    },
                };
                warn!(schema = schema.name(), %detail, "rejected CSV input");
                return Ok(ReadResult::failure(detail));
            }
        };

        let mut issues = IssueLog::new();
        if table.records.is_empty() {
            issues.warning(IssueScope::Report, IssueDetail::NoReports);
            let report = Report::new(schema, Vec::new(), sources, destination)?;
            return Ok(ReadResult::success(report, issues));
        }

        let plan = HeaderPlan::new(&schema, &table.headers);
        for detail in plan.warnings() {
            issues.warning(IssueScope::Report, detail);
        }
        let header_errors = plan.errors();
        if !header_errors.is_empty() {
            for detail in header_errors {
                issues.error(IssueScope::Report, detail);
            }
            return Ok(ReadResult {
                report: None,
                issues,
            });
        }

        let value_sets = schema
            .elements()
            .iter()
            .map(|element| self.metadata.element_value_set(element))
            .collect::<elr_model::Result<Vec<_>>>()?;
        let ctx = ResolveContext {
            schema: &schema,
            plan: &plan,
            value_sets: &value_sets,
            defaults: &options.default_values,
        };
        let tracking_index = schema
            .tracking_element()
            .and_then(|name| schema.element_index(name));

        let mut rows = Vec::with_capacity(table.records.len());
        for (index, record) in table.records.iter().enumerate() {
            let item_number = index + 1;
            let mut row_issues: Vec<RowIssue> = Vec::new();
            let first = first_pass(&ctx, record, &mut row_issues);
            let row = second_pass(&ctx, &first, &self.mappers, &self.metadata, &mut row_issues)?;

            let tracking_id = tracking_index
                .map(|i| row[i].as_str())
                .filter(|id| !id.trim().is_empty())
                .map_or_else(|| format!("row{item_number}"), str::to_string);
            let mut row_has_errors = false;
            for issue in row_issues {
                let scope = IssueScope::item(item_number, tracking_id.clone());
                match issue.severity {
                    IssueSeverity::Error => {
                        row_has_errors = true;
                        issues.error(scope, issue.detail);
                    }
                    IssueSeverity::Warning => issues.warning(scope, issue.detail),
                }
            }
            if issues.error_count() > options.max_errors {
                issues.error(IssueScope::Report, IssueDetail::TooManyErrors);
                warn!(
                    schema = schema.name(),
                    errors = issues.error_count(),
                    "stopped reading CSV after too many errors"
                );
                return Ok(ReadResult {
                    report: None,
                    issues,
                });
            }
            if !row_has_errors {
                rows.push(row);
            }
        }

        debug!(
            schema = schema.name(),
            rows = rows.len(),
            errors = issues.error_count(),
            warnings = issues.warning_count(),
            "read CSV report"
        );
        let report = Report::new(schema, rows, sources, destination)?;
        Ok(ReadResult::success(report, issues))
    }

    /// Parse canonical CSV (one column per element, header = element names).
    ///
    /// Values are taken verbatim. Missing columns take the element default.
    pub fn read_internal<R: Read>(
        &self,
        schema_name: &str,
        input: R,
        sources: Vec<Source>,
        destination: Option<Arc<Destination>>,
    ) -> Result<Report> {
        let schema = Arc::clone(self.metadata.schema(schema_name)?);
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| CsvError::InternalParse(CsvParseFailure::from(err)))?
            .iter()
            .map(normalize_header)
            .collect();
        let columns: Vec<Option<usize>> = schema
            .elements()
            .iter()
            .map(|element| headers.iter().position(|header| *header == element.name))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| CsvError::InternalParse(err.into()))?;
            let row = schema
                .elements()
                .iter()
                .zip(&columns)
                .map(|(element, column)| match column {
                    Some(index) => record.get(*index).unwrap_or_default().to_string(),
                    None => element.default_value().unwrap_or_default().to_string(),
                })
                .collect();
            rows.push(row);
        }
        debug!(schema = schema.name(), rows = rows.len(), "read internal CSV");
        Ok(Report::new(schema, rows, sources, destination)?)
    }
}
