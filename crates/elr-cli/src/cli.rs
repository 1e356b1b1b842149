//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "elr",
    version,
    about = "Convert electronic lab reports between CSV, HL7 v2.5.1 and JSON",
    long_about = "Convert public-health lab reports between formats.\n\n\
                  Reads sender CSV, canonical CSV or HL7 ORU^R01 messages and writes\n\
                  CSV, HL7 (single messages or batches) or newline-delimited JSON."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow row values (patient data) in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert a report from one format to another.
    Convert(ConvertArgs),

    /// List the elements of a schema file.
    Schema(SchemaArgs),
}

#[derive(Parser)]
pub struct ConvertArgs {
    /// Schema definition (JSON).
    #[arg(long = "schema", value_name = "FILE")]
    pub schema: PathBuf,

    /// Value set file (JSON array); repeat for several files.
    #[arg(long = "value-sets", value_name = "FILE")]
    pub value_sets: Vec<PathBuf>,

    /// Receiver configuration (JSON) with translation options.
    #[arg(long = "receiver", value_name = "FILE")]
    pub receiver: Option<PathBuf>,

    /// Input format.
    #[arg(long = "from", value_enum, default_value = "csv")]
    pub from: InputFormatArg,

    /// Output format.
    #[arg(long = "to", value_enum)]
    pub to: OutputFormatArg,

    /// Input file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (default: stdout).
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct SchemaArgs {
    /// Schema definition (JSON).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum InputFormatArg {
    Csv,
    CsvInternal,
    Hl7,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormatArg {
    Csv,
    CsvInternal,
    Hl7,
    Hl7Batch,
    Redox,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
