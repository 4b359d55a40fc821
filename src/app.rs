//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module is the real main:
//! it loads `.env`, sets up logging, parses the CLI, runs the pipeline, prints
//! the report and writes optional exports.

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{AnalysisArgs, AnalyzeArgs, Cli, Command, DemoArgs, ValidateArgs};
use crate::domain::AnalysisConfig;
use crate::error::AppError;
use crate::io::{RawWell, RunDocument};
use crate::logging::{Verbosity, init_tracing};

pub mod pipeline;

use pipeline::RunOutput;

/// Entry point for the `qpcr` binary.
pub fn run() -> Result<(), AppError> {
    // Missing .env is normal; a malformed one is reported once logging is up.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(Verbosity::from_flags(cli.verbose, cli.quiet))
        .map_err(|e| AppError::new(4, format!("Failed to initialise logging: {e}")))?;

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("ignoring .env: {e}"),
    }

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Validate(args) => handle_validate(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = analysis_config_from_args(&args.analysis);
    let run = pipeline::run_file(&args.input.input, args.input.format, &config)?;
    emit_outputs(&run, &args.analysis)
}

fn handle_validate(args: ValidateArgs) -> Result<(), AppError> {
    let raw = crate::io::load_wells(&args.input.input, args.input.format)?;
    let report = crate::io::validate_wells(&raw);

    print!("{}", crate::report::format_validation(&report, raw.len()));

    if report.is_valid() {
        Ok(())
    } else {
        Err(AppError::input(format!(
            "Data validation failed with {} error(s).",
            report.errors.len()
        )))
    }
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let wells = crate::data::generate_plate(usize::from(args.cycles), args.seed)?;
    info!(seed = args.seed, cycles = args.cycles, wells = wells.len(), "generated synthetic plate");

    if let Some(path) = &args.write {
        crate::data::write_plate_json(path, &wells)?;
        info!(path = %path.display(), "wrote synthetic plate");
    }

    let config = analysis_config_from_args(&args.analysis);
    let batch = crate::io::prepare_batch(wells.into_iter().map(RawWell::from).collect())?;
    let run = pipeline::run_batch(batch, &config)?;
    emit_outputs(&run, &args.analysis)
}

fn emit_outputs(run: &RunOutput, args: &AnalysisArgs) -> Result<(), AppError> {
    println!(
        "{}",
        crate::report::format_run_summary(&run.report, &run.processing_info, &run.warnings)
    );
    if !args.no_table {
        println!("{}", crate::report::format_well_table(&run.report));
    }
    print!("{}", crate::report::format_anomaly_counts(&run.report));

    if let Some(path) = &args.export {
        crate::io::write_results_csv(path, &run.report)?;
        info!(path = %path.display(), "exported per-well CSV");
    }
    if let Some(path) = &args.json {
        let document = RunDocument::new(&run.report, &run.processing_info, &run.warnings);
        crate::io::write_report_json(path, &document)?;
        info!(path = %path.display(), "wrote run document");
    }

    Ok(())
}

pub fn analysis_config_from_args(args: &AnalysisArgs) -> AnalysisConfig {
    AnalysisConfig {
        threads: args.threads,
        max_evaluations: args.max_evaluations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_threads_and_evaluation_cap() {
        let cli = Cli::parse_from(["qpcr", "demo", "--threads", "3", "--max-evaluations", "250"]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        let config = analysis_config_from_args(&args.analysis);
        assert_eq!(config.threads, 3);
        assert_eq!(config.max_evaluations, 250);
    }
}
