use std::fs::File;
use std::io::{self, BufReader, Write};

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use tracing::{info, info_span};

use elr_cli::pipeline::{ConvertOutcome, ConvertRequest, InputFormat, OutputFormat, convert};
use elr_model::{Cardinality, Schema};

use crate::cli::{ConvertArgs, InputFormatArg, OutputFormatArg, SchemaArgs};
use crate::summary::{apply_table_style, dim_cell, header_cell};

pub fn run_convert(args: &ConvertArgs) -> Result<ConvertOutcome> {
    let span = info_span!("convert", input = %args.input.display());
    let _guard = span.enter();
    let request = ConvertRequest {
        schema: args.schema.clone(),
        value_sets: args.value_sets.clone(),
        receiver: args.receiver.clone(),
        from: input_format(args.from),
        to: output_format(args.to),
        input: args.input.clone(),
    };
    let outcome = convert(&request)?;
    if let Some(bytes) = &outcome.output {
        match &args.output {
            Some(path) => {
                std::fs::write(path, bytes)
                    .with_context(|| format!("write {}", path.display()))?;
                info!(path = %path.display(), bytes = bytes.len(), "output written");
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(bytes).context("write stdout")?;
                stdout.flush().context("flush stdout")?;
            }
        }
    }
    Ok(outcome)
}

pub fn run_schema(args: &SchemaArgs) -> Result<()> {
    let file = File::open(&args.schema)
        .with_context(|| format!("open {}", args.schema.display()))?;
    let schema: Schema = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse schema {}", args.schema.display()))?;
    println!("Schema: {} ({})", schema.name(), schema.topic());
    if let Some(description) = schema.description() {
        println!("{description}");
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Element"),
        header_cell("Type"),
        header_cell("Required"),
        header_cell("CSV"),
        header_cell("HL7"),
        header_cell("JSON"),
        header_cell("Value set"),
    ]);
    apply_table_style(&mut table);
    for element in schema.elements() {
        let csv: Vec<&str> = element.csv_fields.iter().map(|field| field.name.as_str()).collect();
        let hl7: Vec<&str> = element.hl7_fields().collect();
        let hl7 = match &element.hl7_aoe_question {
            Some(question) => format!("AOE {question}"),
            None => hl7.join(", "),
        };
        table.add_row(vec![
            Cell::new(&element.name),
            Cell::new(format!("{:?}", element.element_type)),
            Cell::new(if element.cardinality == Cardinality::One { "yes" } else { "" }),
            text_cell(csv.join(", ")),
            text_cell(hl7),
            text_cell(element.redox_output_fields.join(", ")),
            text_cell(element.value_set.clone().unwrap_or_default()),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn text_cell(value: String) -> Cell {
    if value.is_empty() {
        dim_cell("-")
    } else {
        Cell::new(value)
    }
}

fn input_format(arg: InputFormatArg) -> InputFormat {
    match arg {
        InputFormatArg::Csv => InputFormat::Csv,
        InputFormatArg::CsvInternal => InputFormat::CsvInternal,
        InputFormatArg::Hl7 => InputFormat::Hl7,
    }
}

fn output_format(arg: OutputFormatArg) -> OutputFormat {
    match arg {
        OutputFormatArg::Csv => OutputFormat::Csv,
        OutputFormatArg::CsvInternal => OutputFormat::CsvInternal,
        OutputFormatArg::Hl7 => OutputFormat::Hl7,
        OutputFormatArg::Hl7Batch => OutputFormat::Hl7Batch,
        OutputFormatArg::Redox => OutputFormat::Redox,
    }
}
