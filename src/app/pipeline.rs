//! Shared analysis pipeline used by `analyze` and `demo`.
//!
//! validated wells -> batch analysis -> processing info
//!
//! Front-ends only decide where the wells come from and what to print.

use chrono::Utc;
use tracing::{info, warn};

use crate::batch::{BatchError, batch_analyze_wells};
use crate::domain::{AnalysisConfig, BatchReport, InputFormat, ProcessingInfo, WellSample};
use crate::error::AppError;
use crate::io::{ValidatedBatch, load_wells, prepare_batch};

/// All computed outputs of one run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: BatchReport,
    pub processing_info: ProcessingInfo,
    pub warnings: Vec<String>,
}

/// Load, validate and analyze a run file.
pub fn run_file(path: &std::path::Path, format: InputFormat, config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let raw = load_wells(path, format)?;
    let batch = prepare_batch(raw)?;
    run_batch(batch, config)
}

/// Analyze wells that already passed validation.
pub fn run_batch(batch: ValidatedBatch, config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let ValidatedBatch { wells, warnings } = batch;
    for w in &warnings {
        warn!("{w}");
    }

    info!(wells = wells.len(), threads = config.threads, "analyzing batch");
    let report = batch_analyze_wells(&wells, config).map_err(batch_failure)?;
    let processing_info = processing_info(&wells);

    Ok(RunOutput {
        report,
        processing_info,
        warnings,
    })
}

fn batch_failure(err: BatchError) -> AppError {
    AppError::internal(format!("Batch analysis failed: {err}"))
}

fn processing_info(wells: &[WellSample]) -> ProcessingInfo {
    ProcessingInfo {
        data_points_per_well: wells.first().map_or(0, |w| w.cycles.len()),
        processing_timestamp: Utc::now(),
        total_wells_processed: wells.len(),
    }
}
