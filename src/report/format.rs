//! Formatted terminal output.
//!
//! Formatting lives here so the fitting code stays free of presentation
//! concerns and output changes stay localized.

use crate::domain::{BatchReport, ProcessingInfo, WellAnalysis};
use crate::io::ValidationReport;
use crate::report::{anomaly_counts, clean_well_count};

/// Run header: batch counts, cycle axis, timestamp and validation warnings.
pub fn format_run_summary(report: &BatchReport, info: &ProcessingInfo, warnings: &[String]) -> String {
    let mut out = String::new();

    out.push_str("=== qpcr - Amplification Curve Quality ===\n");
    out.push_str(&format!(
        "Processed: {}\n",
        info.processing_timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    match &report.cycle_info {
        Some(c) => out.push_str(&format!(
            "Wells: {} | cycles=[{}, {}] ({} points per well)\n",
            info.total_wells_processed, c.min, c.max, c.count
        )),
        None => out.push_str(&format!("Wells: {} | no cycle data\n", info.total_wells_processed)),
    }

    out.push_str(&format!(
        "Good S-curves: {}/{} ({:.1}%)\n",
        report.summary.good_curves, report.summary.total_wells, report.summary.success_rate
    ));

    if !warnings.is_empty() {
        out.push_str(&format!("\nValidation warnings ({}):\n", warnings.len()));
        for w in warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }

    out
}

/// One row per well, in batch order.
pub fn format_well_table(report: &BatchReport) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<8} {:<6} {:>8} {:>10} {:>10} {:>8} {:>8} {:>10}  {}\n",
            "well", "status", "r2", "rmse", "amplitude", "k", "x0", "baseline", "anomalies"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<8} {:-<6} {:-<8} {:-<10} {:-<10} {:-<8} {:-<8} {:-<10}  {:-<9}\n",
            "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for well in &report.individual_results {
        out.push_str(format_row(well).trim_end());
        out.push('\n');
    }

    out
}

fn format_row(well: &WellAnalysis) -> String {
    let status = if well.is_good_scurve() { "good" } else { "poor" };
    let anomalies = fmt_anomalies(well);
    let id = truncate(&well.well_id, 8);

    match well.outcome.fit() {
        Some(fit) => format!(
            "{:<8} {:<6} {:>8.4} {:>10.2} {:>10.2} {:>8.4} {:>8.2} {:>10.2}  {}\n",
            id, status, fit.r2_score, fit.rmse, fit.amplitude, fit.steepness, fit.midpoint, fit.baseline, anomalies
        ),
        None => format!(
            "{:<8} {:<6} {:>8} {:>10} {:>10} {:>8} {:>8} {:>10}  {} ({})\n",
            id,
            status,
            "-",
            "-",
            "-",
            "-",
            "-",
            "-",
            anomalies,
            well.outcome.error().unwrap_or("not fitted"),
        ),
    }
}

/// Tally of anomaly tags across the batch.
pub fn format_anomaly_counts(report: &BatchReport) -> String {
    let mut out = String::new();
    let counts = anomaly_counts(report);

    out.push_str("Anomalies:\n");
    if counts.is_empty() {
        out.push_str("  none\n");
        return out;
    }
    for (tag, n) in counts {
        out.push_str(&format!("  {:<24} {n:>4}\n", tag.as_str()));
    }
    out.push_str(&format!("  {:<24} {:>4}\n", "(clean wells)", clean_well_count(report)));
    out
}

/// Output of `qpcr validate`.
pub fn format_validation(report: &ValidationReport, wells: usize) -> String {
    let mut out = String::new();
    let verdict = if report.is_valid() { "OK" } else { "FAILED" };
    out.push_str(&format!("Validation {verdict}: {wells} wells\n"));

    if !report.errors.is_empty() {
        out.push_str(&format!("Errors ({}):\n", report.errors.len()));
        for e in &report.errors {
            out.push_str(&format!("- {e}\n"));
        }
    }
    if !report.warnings.is_empty() {
        out.push_str(&format!("Warnings ({}):\n", report.warnings.len()));
        for w in &report.warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }
    out
}

fn fmt_anomalies(well: &WellAnalysis) -> String {
    if well.anomalies.is_empty() {
        return "-".to_string();
    }
    let tags: Vec<&str> = well.anomalies.iter().map(|a| a.as_str()).collect();
    tags.join(",")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
