//! Pre-flight structural check of an ingested batch.
//!
//! Errors block the whole batch: an empty input, a well missing one of its two
//! sequences, mismatched sequence lengths, or a duplicated well id.
//!
//! Warnings are advisory and travel with the output: very short series, cycle
//! numbers outside `[0, 100]`, negative responses.

use std::collections::HashSet;

use crate::domain::{MIN_POINTS, WellSample};
use crate::error::AppError;
use crate::io::ingest::RawWell;
use crate::math::min_max;

/// Collected validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A batch that passed the structural check.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub wells: Vec<WellSample>,
    pub warnings: Vec<String>,
}

/// Check every well and collect all errors and warnings.
pub fn validate_wells(wells: &[RawWell]) -> ValidationReport {
    let mut report = ValidationReport::default();

    if wells.is_empty() {
        report.errors.push("No data provided".to_string());
        return report;
    }

    let mut seen = HashSet::new();
    for well in wells {
        let id = &well.well_id;
        if !seen.insert(id.as_str()) {
            report.errors.push(format!("Well {id}: Duplicate well id"));
            continue;
        }

        let (Some(cycles), Some(rfu)) = (&well.cycles, &well.rfu) else {
            report.errors.push(format!("Well {id}: Missing cycles or rfu data"));
            continue;
        };

        if cycles.len() != rfu.len() {
            report.errors.push(format!("Well {id}: Cycles and RFU data length mismatch"));
            continue;
        }

        if cycles.len() < MIN_POINTS {
            report
                .warnings
                .push(format!("Well {id}: Very few data points ({})", cycles.len()));
        }

        let finite_cycles: Vec<f64> = cycles.iter().copied().filter(|c| c.is_finite()).collect();
        if let Some((lo, hi)) = min_max(&finite_cycles) {
            if lo < 0.0 || hi > 100.0 {
                report
                    .warnings
                    .push(format!("Well {id}: Unusual cycle range ({lo}-{hi})"));
            }
        }

        if rfu.iter().any(|&v| v < 0.0) {
            report.warnings.push(format!("Well {id}: Contains negative RFU values"));
        }
    }

    report
}

/// Validate and convert to core input, or fail with every error message.
pub fn prepare_batch(wells: Vec<RawWell>) -> Result<ValidatedBatch, AppError> {
    if wells.is_empty() {
        return Err(AppError::no_data("No data provided"));
    }

    let report = validate_wells(&wells);
    if !report.is_valid() {
        let mut message = String::from("Data validation failed:");
        for error in &report.errors {
            message.push_str("\n  - ");
            message.push_str(error);
        }
        return Err(AppError::input(message));
    }

    let wells = wells
        .into_iter()
        .map(|w| WellSample {
            well_id: w.well_id,
            cycles: w.cycles.unwrap_or_default(),
            rfu: w.rfu.unwrap_or_default(),
        })
        .collect();

    Ok(ValidatedBatch {
        wells,
        warnings: report.warnings,
    })
}
