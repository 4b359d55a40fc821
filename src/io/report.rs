//! Write the JSON run document.
//!
//! The document is the batch report flattened at the top level, plus the
//! pipeline's bookkeeping:
//!
//! ```text
//! { individual_results, good_curves, cycle_info, summary,
//!   processing_info, validation_warnings?, success }
//! ```
//!
//! It is the hand-off format for anything that stores or displays runs.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{BatchReport, ProcessingInfo};
use crate::error::AppError;

/// Serialized shape of one analysis run.
#[derive(Debug, Serialize)]
pub struct RunDocument<'a> {
    #[serde(flatten)]
    pub report: &'a BatchReport,
    pub processing_info: &'a ProcessingInfo,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub validation_warnings: &'a [String],
    pub success: bool,
}

impl<'a> RunDocument<'a> {
    pub fn new(report: &'a BatchReport, processing_info: &'a ProcessingInfo, validation_warnings: &'a [String]) -> Self {
        Self {
            report,
            processing_info,
            validation_warnings,
            success: true,
        }
    }
}

/// Write the run document to a file, pretty printed.
pub fn write_report_json(path: &Path, document: &RunDocument<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create report JSON '{}': {e}", path.display())))?;
    write_report(file, document)
}

pub fn write_report<W: Write>(mut writer: W, document: &RunDocument<'_>) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut writer, document)
        .map_err(|e| AppError::output(format!("Failed to write report JSON: {e}")))?;
    writeln!(writer).map_err(|e| AppError::output(format!("Failed to write report JSON: {e}")))?;
    Ok(())
}
