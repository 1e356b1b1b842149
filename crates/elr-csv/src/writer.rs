//! Writing reports as CSV.

use std::io::Write;

use csv::{Terminator, WriterBuilder};
use elr_model::Report;
use tracing::debug;

use crate::error::Result;
use crate::reader::CsvSerializer;

fn csv_writer<W: Write>(sink: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(sink)
}

impl CsvSerializer {
    /// Write the external form: one column per CSV sub-field, each value
    /// rendered with its column format.
    pub fn write<W: Write>(&self, report: &Report, sink: W) -> Result<()> {
        let schema = report.schema();
        let columns: Vec<_> = schema.csv_fields().collect();
        let value_sets = columns
            .iter()
            .map(|(element, _)| self.metadata().element_value_set(element))
            .collect::<elr_model::Result<Vec<_>>>()?;

        let mut writer = csv_writer(sink);
        writer.write_record(columns.iter().map(|(_, field)| field.name.as_str()))?;
        for index in 0..report.row_count() {
            let record = columns.iter().zip(&value_sets).map(|((element, field), set)| {
                element.to_formatted(
                    report.value(index, &element.name),
                    field.format.as_deref(),
                    *set,
                )
            });
            writer.write_record(record)?;
        }
        writer.flush()?;
        debug!(
            schema = schema.name(),
            rows = report.row_count(),
            columns = columns.len(),
            "wrote CSV"
        );
        Ok(())
    }

    /// Write the canonical form: header = element names, values verbatim.
    pub fn write_internal<W: Write>(&self, report: &Report, sink: W) -> Result<()> {
        let schema = report.schema();
        let mut writer = csv_writer(sink);
        writer.write_record(schema.elements().iter().map(|element| element.name.as_str()))?;
        for row in report.rows() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!(schema = schema.name(), rows = report.row_count(), "wrote internal CSV");
        Ok(())
    }
}
