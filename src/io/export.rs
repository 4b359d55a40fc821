//! Export per-well results to CSV.
//!
//! One row per well in batch order, meant for spreadsheets or downstream
//! scripts. Wells without a fit print `N/A` in every numeric column.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{BatchReport, CurveFit, WellAnalysis};
use crate::error::AppError;

const HEADER: [&str; 11] = [
    "Well",
    "Status",
    "R2_Score",
    "RMSE",
    "Amplitude",
    "Steepness",
    "Midpoint",
    "Baseline",
    "Data_Points",
    "Cycle_Range",
    "Anomalies",
];

const NOT_AVAILABLE: &str = "N/A";

/// Write per-well results to a CSV file.
pub fn write_results_csv(path: &Path, report: &BatchReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_results(file, report)
}

/// Write per-well results as CSV to any writer.
pub fn write_results<W: Write>(writer: W, report: &BatchReport) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);

    out.write_record(HEADER)
        .map_err(|e| AppError::output(format!("Failed to write export CSV header: {e}")))?;

    for well in &report.individual_results {
        out.write_record(row(well))
            .map_err(|e| AppError::output(format!("Failed to write export CSV row for {}: {e}", well.well_id)))?;
    }

    out.flush()
        .map_err(|e| AppError::output(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

fn row(well: &WellAnalysis) -> Vec<String> {
    let status = if well.is_good_scurve() { "Good" } else { "Poor" };
    let mut row = vec![well.well_id.clone(), status.to_string()];

    match well.outcome.fit() {
        Some(fit) => row.extend(fit_columns(fit)),
        None => row.extend(std::iter::repeat_n(NOT_AVAILABLE.to_string(), 8)),
    }

    let anomalies: Vec<&str> = well.anomalies.iter().map(|a| a.as_str()).collect();
    row.push(anomalies.join(";"));
    row
}

fn fit_columns(fit: &CurveFit) -> [String; 8] {
    [
        format!("{:.4}", fit.r2_score),
        format!("{:.2}", fit.rmse),
        format!("{:.2}", fit.amplitude),
        format!("{:.4}", fit.steepness),
        format!("{:.2}", fit.midpoint),
        format!("{:.2}", fit.baseline),
        fit.data_points.to_string(),
        format!("{:.1}", fit.cycle_range),
    ]
}
