//! Shared domain types.
//!
//! Outputs are built once per analysis and never mutated afterwards; they are
//! serializable so the same values can be printed, exported to CSV, or handed to
//! a storage layer as JSON.

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::math::DEFAULT_MAX_EVALUATIONS;
use crate::models::SigmoidParams;

/// Input file format.
///
/// `Auto` means: `.json` files are read as JSON, everything else as wide CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Auto,
    Csv,
    Json,
}

/// One well's raw amplification trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellSample {
    pub well_id: String,
    pub cycles: Vec<f64>,
    pub rfu: Vec<f64>,
}

impl WellSample {
    pub fn new(well_id: impl Into<String>, cycles: Vec<f64>, rfu: Vec<f64>) -> Self {
        Self {
            well_id: well_id.into(),
            cycles,
            rfu,
        }
    }
}

/// A successful sigmoid fit with its quality metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveFit {
    pub r2_score: f64,
    pub rmse: f64,
    pub amplitude: f64,
    pub steepness: f64,
    pub midpoint: f64,
    pub baseline: f64,
    pub is_good_scurve: bool,
    /// `[L, k, x0, B]`.
    pub fit_parameters: [f64; 4],
    /// One-sigma errors in the same order as `fit_parameters`.
    pub parameter_errors: [f64; 4],
    /// Model values at each cycle used for the fit.
    pub fitted_curve: Vec<f64>,
    pub data_points: usize,
    pub cycle_range: f64,
}

impl CurveFit {
    pub fn params(&self) -> SigmoidParams {
        SigmoidParams::new(self.amplitude, self.steepness, self.midpoint, self.baseline)
    }
}

/// A well that could not be fitted (too little data or solver failure).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitFailure {
    pub error: String,
    pub is_good_scurve: bool,
}

impl FitFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            is_good_scurve: false,
        }
    }
}

/// Per-well fit result: either a full fit or a degraded error record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FitOutcome {
    Fitted(CurveFit),
    Failed(FitFailure),
}

impl FitOutcome {
    pub fn is_good_scurve(&self) -> bool {
        match self {
            FitOutcome::Fitted(fit) => fit.is_good_scurve,
            FitOutcome::Failed(_) => false,
        }
    }

    pub fn fit(&self) -> Option<&CurveFit> {
        match self {
            FitOutcome::Fitted(fit) => Some(fit),
            FitOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FitOutcome::Fitted(_) => None,
            FitOutcome::Failed(failure) => Some(&failure.error),
        }
    }
}

impl<E: fmt::Display> From<Result<CurveFit, E>> for FitOutcome {
    fn from(result: Result<CurveFit, E>) -> Self {
        match result {
            Ok(fit) => FitOutcome::Fitted(fit),
            Err(err) => FitOutcome::Failed(FitFailure::new(err.to_string())),
        }
    }
}

/// Known curve pathologies, in the order the detector checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyTag {
    InsufficientData,
    InsufficientValidData,
    LowAmplitude,
    EarlyPlateau,
    UnstableBaseline,
    NegativeAmplification,
    NegativeRfuValues,
    HighNoise,
}

impl AnomalyTag {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyTag::InsufficientData => "insufficient_data",
            AnomalyTag::InsufficientValidData => "insufficient_valid_data",
            AnomalyTag::LowAmplitude => "low_amplitude",
            AnomalyTag::EarlyPlateau => "early_plateau",
            AnomalyTag::UnstableBaseline => "unstable_baseline",
            AnomalyTag::NegativeAmplification => "negative_amplification",
            AnomalyTag::NegativeRfuValues => "negative_rfu_values",
            AnomalyTag::HighNoise => "high_noise",
        }
    }
}

impl fmt::Display for AnomalyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fit outcome and anomaly tags for one well.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellAnalysis {
    pub well_id: String,
    #[serde(flatten)]
    pub outcome: FitOutcome,
    pub anomalies: Vec<AnomalyTag>,
}

impl WellAnalysis {
    pub fn is_good_scurve(&self) -> bool {
        self.outcome.is_good_scurve()
    }
}

/// Cycle axis of the run, taken from the first well with data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleInfo {
    pub min: i64,
    pub max: i64,
    pub count: usize,
}

/// Run-level counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_wells: usize,
    pub good_curves: usize,
    /// Percentage of good curves; `0` for an empty batch.
    pub success_rate: f64,
}

impl BatchSummary {
    pub fn new(total_wells: usize, good_curves: usize) -> Self {
        let success_rate = if total_wells == 0 {
            0.0
        } else {
            good_curves as f64 / total_wells as f64 * 100.0
        };
        Self {
            total_wells,
            good_curves,
            success_rate,
        }
    }
}

/// Everything the core computes for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// One entry per input well, in input order.
    pub individual_results: Vec<WellAnalysis>,
    /// Ids of wells classified as good S-curves, in input order.
    pub good_curves: Vec<String>,
    pub cycle_info: Option<CycleInfo>,
    pub summary: BatchSummary,
}

/// Bookkeeping attached to a run's output (not part of the analysis itself).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingInfo {
    /// Cycle count of the first well in the batch.
    pub data_points_per_well: usize,
    pub processing_timestamp: DateTime<Utc>,
    pub total_wells_processed: usize,
}

/// Knobs for a batch analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Worker threads for per-well fitting (`0` = rayon's default pool).
    pub threads: usize,
    /// Model evaluation cap per well fit.
    pub max_evaluations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
        }
    }
}
