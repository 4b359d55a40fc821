//! Command-line parsing for the qPCR curve-quality analyzer.
//!
//! Argument parsing and command dispatch stay separate from the fitting code;
//! `app` turns these structs into an `AnalysisConfig` and output options.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::MIN_PLATE_CYCLES;
use crate::domain::InputFormat;
use crate::math::DEFAULT_MAX_EVALUATIONS;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "qpcr", version, about = "qPCR amplification curve quality analyzer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Debug-level logging (overridden by QPCR_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors (overridden by QPCR_LOG).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every well of a run, flag anomalies, print a report and optionally export.
    Analyze(AnalyzeArgs),
    /// Run the pre-flight structural check only.
    Validate(ValidateArgs),
    /// Generate a synthetic plate and analyze it.
    Demo(DemoArgs),
}

/// Input file selection.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Run data: JSON `{ well: {cycles, rfu} }` or wide CSV (cycle column + one column per well).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Input format (`auto` picks by file extension).
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,
}

/// Analysis knobs and outputs shared by `analyze` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct AnalysisArgs {
    /// Worker threads for per-well fitting (0 = one per core).
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Model evaluation cap per well fit.
    #[arg(long, default_value_t = DEFAULT_MAX_EVALUATIONS)]
    pub max_evaluations: usize,

    /// Write the full run document (results, summary, processing info) as JSON.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Export per-well results to CSV.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Skip the per-well table in terminal output.
    #[arg(long)]
    pub no_table: bool,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Random seed for the synthetic plate.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Cycles per well.
    #[arg(long, default_value_t = 40, value_parser = clap::value_parser!(u16).range(MIN_PLATE_CYCLES as i64..=1000))]
    pub cycles: u16,

    /// Also write the generated plate as JSON input.
    #[arg(long, value_name = "PATH")]
    pub write: Option<PathBuf>,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}
