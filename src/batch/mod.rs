//! Batch analysis over all wells of a run.
//!
//! Wells are independent: each one is fitted and screened for anomalies on the
//! rayon pool, and results are collected back in input order. A failing well
//! becomes a degraded record (error message, `is_good_scurve = false`) and never
//! affects its siblings.

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::anomaly::detect_curve_anomalies;
use crate::domain::{AnalysisConfig, BatchReport, BatchSummary, CycleInfo, FitOutcome, WellAnalysis, WellSample};
use crate::fit::CurveFitter;
use crate::math::min_max;

/// Batch-level failure. Per-well problems never end up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("failed to start a worker pool with {threads} threads: {reason}")]
    WorkerPool { threads: usize, reason: String },
}

/// Analyze every well and aggregate the run summary.
pub fn batch_analyze_wells(wells: &[WellSample], config: &AnalysisConfig) -> Result<BatchReport, BatchError> {
    let fitter = CurveFitter::with_max_evaluations(config.max_evaluations);

    let individual_results = if config.threads == 0 {
        analyze_all(wells, &fitter)
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| BatchError::WorkerPool {
                threads: config.threads,
                reason: e.to_string(),
            })?;
        pool.install(|| analyze_all(wells, &fitter))
    };

    Ok(summarize(wells, individual_results))
}

/// Fit and screen a single well.
pub fn analyze_well(well: &WellSample, fitter: &CurveFitter) -> WellAnalysis {
    let outcome = FitOutcome::from(fitter.fit(&well.cycles, &well.rfu));
    let anomalies = detect_curve_anomalies(&well.cycles, &well.rfu);

    match &outcome {
        FitOutcome::Fitted(fit) => debug!(
            well = %well.well_id,
            r2 = fit.r2_score,
            good = fit.is_good_scurve,
            anomalies = anomalies.len(),
            "well fitted"
        ),
        FitOutcome::Failed(failure) => debug!(
            well = %well.well_id,
            error = %failure.error,
            anomalies = anomalies.len(),
            "well not fitted"
        ),
    }

    WellAnalysis {
        well_id: well.well_id.clone(),
        outcome,
        anomalies,
    }
}

fn analyze_all(wells: &[WellSample], fitter: &CurveFitter) -> Vec<WellAnalysis> {
    wells.par_iter().map(|well| analyze_well(well, fitter)).collect()
}

/// Build the report from per-well results that are aligned with `wells`.
fn summarize(wells: &[WellSample], individual_results: Vec<WellAnalysis>) -> BatchReport {
    let good_curves: Vec<String> = individual_results
        .iter()
        .filter(|r| r.is_good_scurve())
        .map(|r| r.well_id.clone())
        .collect();

    let cycle_info = wells.iter().find_map(|w| cycle_info(&w.cycles));
    let summary = BatchSummary::new(individual_results.len(), good_curves.len());

    info!(
        total_wells = summary.total_wells,
        good_curves = summary.good_curves,
        success_rate = summary.success_rate,
        "batch analyzed"
    );

    BatchReport {
        individual_results,
        good_curves,
        cycle_info,
        summary,
    }
}

/// Min/max (truncated to whole cycles) and count of one well's cycle axis.
///
/// `None` when the axis has no finite value, so the caller moves on to the next well.
fn cycle_info(cycles: &[f64]) -> Option<CycleInfo> {
    let finite: Vec<f64> = cycles.iter().copied().filter(|c| c.is_finite()).collect();
    let (min, max) = min_max(&finite)?;
    Some(CycleInfo {
        min: min.trunc() as i64,
        max: max.trunc() as i64,
        count: cycles.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnomalyTag;
    use crate::models::{SigmoidParams, evaluate_curve};

    fn good_well(id: &str) -> WellSample {
        let cycles: Vec<f64> = (1..=40).map(f64::from).collect();
        let rfu = evaluate_curve(&cycles, &SigmoidParams::new(1000.0, 0.6, 22.0, 120.0));
        WellSample::new(id, cycles, rfu)
    }

    fn flat_well(id: &str) -> WellSample {
        let cycles: Vec<f64> = (1..=40).map(f64::from).collect();
        WellSample::new(id, cycles, vec![300.0; 40])
    }

    #[test]
    fn one_good_one_poor_is_fifty_percent() {
        let wells = vec![good_well("A1"), flat_well("A2")];
        let report = batch_analyze_wells(&wells, &AnalysisConfig::default()).unwrap();

        assert_eq!(report.summary.total_wells, 2);
        assert_eq!(report.summary.good_curves, 1);
        assert_eq!(report.summary.success_rate, 50.0);
        assert_eq!(report.good_curves, vec!["A1".to_string()]);

        let flat = &report.individual_results[1];
        assert!(!flat.is_good_scurve());
        assert!(flat.outcome.error().is_some());
        assert!(flat.anomalies.contains(&AnomalyTag::LowAmplitude));
    }

    #[test]
    fn empty_batch_has_zero_success_rate() {
        let report = batch_analyze_wells(&[], &AnalysisConfig::default()).unwrap();
        assert_eq!(report.summary.total_wells, 0);
        assert_eq!(report.summary.success_rate, 0.0);
        assert!(report.cycle_info.is_none());
        assert!(report.individual_results.is_empty());
    }

    #[test]
    fn output_order_follows_input_order() {
        let ids = ["H12", "A1", "C3", "B2", "D4", "G7"];
        let wells: Vec<WellSample> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| if i % 2 == 0 { good_well(id) } else { flat_well(id) })
            .collect();
        let config = AnalysisConfig {
            threads: 3,
            ..AnalysisConfig::default()
        };

        let report = batch_analyze_wells(&wells, &config).unwrap();
        let got: Vec<&str> = report.individual_results.iter().map(|r| r.well_id.as_str()).collect();
        assert_eq!(got, ids);
        assert_eq!(report.good_curves, vec!["H12", "C3", "D4"]);
    }

    #[test]
    fn short_well_is_degraded_not_fatal() {
        let short = WellSample::new("E5", vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]);
        let wells = vec![short, good_well("E6")];
        let report = batch_analyze_wells(&wells, &AnalysisConfig::default()).unwrap();

        let first = &report.individual_results[0];
        assert_eq!(first.outcome.error(), Some("Insufficient data points"));
        assert!(first.outcome.fit().is_none());
        assert_eq!(first.anomalies, vec![AnomalyTag::InsufficientData]);
        assert_eq!(report.summary.good_curves, 1);
    }

    #[test]
    fn cycle_info_comes_from_first_well_with_data() {
        let empty = WellSample::new("A0", vec![], vec![]);
        let mut second = good_well("A1");
        second.cycles = (0..40).map(|c| f64::from(c) + 0.7).collect();
        let wells = vec![empty, second, flat_well("A2")];

        let report = batch_analyze_wells(&wells, &AnalysisConfig::default()).unwrap();
        assert_eq!(
            report.cycle_info,
            Some(CycleInfo {
                min: 0,
                max: 39,
                count: 40
            })
        );
    }

    #[test]
    fn fitted_curve_matches_valid_point_count() {
        let mut well = good_well("F1");
        well.rfu[5] = f64::NAN;
        let report = batch_analyze_wells(&[well], &AnalysisConfig::default()).unwrap();
        let fit = report.individual_results[0].outcome.fit().unwrap();
        assert_eq!(fit.fitted_curve.len(), 39);
        assert_eq!(fit.data_points, 39);
    }

    #[test]
    fn cycle_info_skips_wells_without_finite_cycles() {
        let unusable = WellSample::new("A0", vec![f64::NAN; 40], vec![100.0; 40]);
        let wells = vec![unusable, good_well("A1")];

        let report = batch_analyze_wells(&wells, &AnalysisConfig::default()).unwrap();
        assert_eq!(
            report.cycle_info,
            Some(CycleInfo {
                min: 1,
                max: 40,
                count: 40
            })
        );
    }
}
