//! Reporting utilities: anomaly tallies and formatted terminal output.

use std::collections::BTreeMap;

use crate::domain::{AnomalyTag, BatchReport};

pub mod format;

pub use format::*;

/// How many wells carry each anomaly tag, in tag order.
pub fn anomaly_counts(report: &BatchReport) -> BTreeMap<AnomalyTag, usize> {
    let mut counts = BTreeMap::new();
    for well in &report.individual_results {
        for &tag in &well.anomalies {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    counts
}

/// Wells with no anomaly tag at all.
pub fn clean_well_count(report: &BatchReport) -> usize {
    report
        .individual_results
        .iter()
        .filter(|w| w.anomalies.is_empty())
        .count()
}
