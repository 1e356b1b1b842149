//! Conversion pipeline: load catalog, read input, write output.
//!
//! Each stage is a free function so the integration tests can drive the
//! pipeline without going through argument parsing.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use elr_csv::{CsvReadOptions, CsvSerializer};
use elr_hl7::Hl7Serializer;
use elr_map::MapperRegistry;
use elr_model::{Destination, IssueLog, Metadata, ReadResult, Report, Source};
use elr_redox::RedoxSerializer;
use tracing::{debug, info, trace};

use crate::logging::redact_value;

/// Formats a report can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Sender CSV, columns bound through each element's CSV fields.
    Csv,
    /// One column per element, header = element names.
    CsvInternal,
    Hl7,
}

/// Formats a report can be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    CsvInternal,
    /// One message per row, or a batch when the receiver asks for headers.
    Hl7,
    Hl7Batch,
    Redox,
}

/// Everything one conversion needs.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub schema: PathBuf,
    pub value_sets: Vec<PathBuf>,
    pub receiver: Option<PathBuf>,
    pub from: InputFormat,
    pub to: OutputFormat,
    pub input: PathBuf,
}

/// Result of a conversion.
#[derive(Debug)]
pub struct ConvertOutcome {
    pub schema: String,
    pub rows: usize,
    pub issues: IssueLog,
    /// `None` when the read produced no report.
    pub output: Option<Vec<u8>>,
}

impl ConvertOutcome {
    pub fn has_errors(&self) -> bool {
        self.issues.has_errors()
    }
}

/// The codecs sharing one catalog.
#[derive(Debug)]
pub struct Codecs {
    pub csv: CsvSerializer,
    pub hl7: Hl7Serializer,
    pub redox: RedoxSerializer,
}

impl Codecs {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        let mappers = Arc::new(MapperRegistry::with_builtins());
        Self {
            csv: CsvSerializer::new(Arc::clone(&metadata), Arc::clone(&mappers)),
            hl7: Hl7Serializer::new(Arc::clone(&metadata), mappers),
            redox: RedoxSerializer::new(metadata),
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Build a catalog from value set files and one schema file.
///
/// Value sets load first since registering a schema checks its references.
pub fn load_metadata(schema_path: &Path, value_set_paths: &[PathBuf]) -> Result<(Metadata, String)> {
    let mut metadata = Metadata::new();
    for path in value_set_paths {
        let count = metadata
            .load_value_sets(open(path)?)
            .with_context(|| format!("load value sets from {}", path.display()))?;
        debug!(path = %path.display(), count, "value sets loaded");
    }
    let schema = metadata
        .load_schema(open(schema_path)?)
        .with_context(|| format!("load schema from {}", schema_path.display()))?;
    info!(
        schema = schema.name(),
        elements = schema.len(),
        "schema loaded"
    );
    Ok((metadata, schema.name().to_string()))
}

/// Parse a receiver configuration file.
pub fn load_destination(path: &Path) -> Result<Destination> {
    serde_json::from_reader(open(path)?)
        .with_context(|| format!("parse receiver config {}", path.display()))
}

/// Read `input` as `format`. Internal CSV has no issue log of its own and is
/// wrapped as a successful read.
pub fn read_report(
    codecs: &Codecs,
    schema_name: &str,
    format: InputFormat,
    input: &Path,
    destination: Option<Arc<Destination>>,
) -> Result<ReadResult> {
    let sources = vec![Source::File(input.to_path_buf())];
    let reader = open(input)?;
    let result = match format {
        InputFormat::Csv => codecs
            .csv
            .read_external(
                schema_name,
                reader,
                sources,
                &CsvReadOptions::default(),
                destination,
            )
            .context("read CSV")?,
        InputFormat::CsvInternal => {
            let report = codecs
                .csv
                .read_internal(schema_name, reader, sources, destination)
                .context("read internal CSV")?;
            ReadResult::success(report, IssueLog::new())
        }
        InputFormat::Hl7 => codecs
            .hl7
            .read_external(schema_name, reader, sources, destination)
            .context("read HL7")?,
    };
    Ok(result)
}

/// Serialize `report` as `format`.
pub fn write_report(codecs: &Codecs, report: &Report, format: OutputFormat) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match format {
        OutputFormat::Csv => codecs.csv.write(report, &mut out).context("write CSV")?,
        OutputFormat::CsvInternal => codecs
            .csv
            .write_internal(report, &mut out)
            .context("write internal CSV")?,
        OutputFormat::Hl7Batch => codecs
            .hl7
            .write_batch(report, &mut out)
            .context("write HL7 batch")?,
        OutputFormat::Hl7 => {
            let batched = report
                .destination()
                .is_some_and(|destination| destination.translation.use_batch_headers);
            if batched {
                codecs
                    .hl7
                    .write_batch(report, &mut out)
                    .context("write HL7 batch")?;
            } else {
                for single in report.split().context("split report")? {
                    codecs
                        .hl7
                        .write(&single, &mut out)
                        .context("write HL7 message")?;
                }
            }
        }
        OutputFormat::Redox => codecs
            .redox
            .write(report, &mut out)
            .context("write JSON")?,
    }
    Ok(out)
}

/// Run one conversion end to end.
pub fn convert(request: &ConvertRequest) -> Result<ConvertOutcome> {
    let (metadata, schema_name) = load_metadata(&request.schema, &request.value_sets)?;
    let destination = request
        .receiver
        .as_deref()
        .map(load_destination)
        .transpose()?
        .map(Arc::new);
    if let Some(destination) = &destination {
        info!(receiver = %destination.full_name(), "receiver loaded");
    }
    let codecs = Codecs::new(Arc::new(metadata));

    info!(input = %request.input.display(), format = ?request.from, "reading");
    let ReadResult { report, issues } =
        read_report(&codecs, &schema_name, request.from, &request.input, destination)?;
    info!(
        errors = issues.error_count(),
        warnings = issues.warning_count(),
        "read complete"
    );

    let Some(report) = report else {
        return Ok(ConvertOutcome {
            schema: schema_name,
            rows: 0,
            issues,
            output: None,
        });
    };
    for row in 0..report.row_count() {
        for (name, value) in report.row_map(row) {
            trace!(row, element = name, value = redact_value(value), "row value");
        }
    }

    info!(rows = report.row_count(), format = ?request.to, "writing");
    let output = write_report(&codecs, &report, request.to)?;
    Ok(ConvertOutcome {
        schema: schema_name,
        rows: report.row_count(),
        issues,
        output: Some(output),
    })
}
