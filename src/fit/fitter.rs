//! Sigmoid fitting and S-curve classification for a single well.
//!
//! Given one well's `(cycles, rfu)`:
//!
//! 1. drop non-finite pairs (at least 5 points must remain)
//! 2. derive an initial guess and box bounds from the observed ranges
//! 3. solve the bounded least-squares problem
//! 4. compute r², RMSE and parameter standard errors
//! 5. classify with thresholds that adapt to the signal range and run length
//!
//! Every failure is returned as a typed [`FitError`]; the batch layer turns it
//! into a degraded per-well record instead of aborting the run.

use thiserror::Error;

use crate::domain::{CurveFit, SeriesError, ValidSeries};
use crate::math::{
    BoundedLeastSquares, Bounds, ProjectedLevenbergMarquardt, SolverError, min_max, r2_score, rmse,
};
use crate::models::{SigmoidModel, SigmoidParams, evaluate_curve};

/// Conservative starting steepness; the data rarely pins it down before the fit.
pub const STEEPNESS_GUESS: f64 = 0.5;
/// Steepness search interval.
pub const STEEPNESS_BOUNDS: (f64, f64) = (0.01, 10.0);
/// Minimum fitted steepness for a good S-curve.
pub const MIN_GOOD_STEEPNESS: f64 = 0.05;
/// Absolute floor of the amplitude a good S-curve must exceed.
pub const MIN_AMPLITUDE_FLOOR: f64 = 50.0;

/// Why a well could not be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Classification thresholds for one well.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    /// Fitted amplitude must exceed `max(50, 0.3 × rfu range)`.
    pub min_amplitude: f64,
    /// r² must exceed 0.9 for runs longer than 20 points, 0.85 otherwise.
    pub r2_threshold: f64,
}

impl QualityThresholds {
    pub fn for_series(rfu_range: f64, data_points: usize) -> Self {
        Self {
            min_amplitude: MIN_AMPLITUDE_FLOOR.max(rfu_range * 0.3),
            r2_threshold: if data_points > 20 { 0.9 } else { 0.85 },
        }
    }

    pub fn is_good_scurve(&self, r2: f64, params: &SigmoidParams) -> bool {
        r2 > self.r2_threshold && params.steepness > MIN_GOOD_STEEPNESS && params.amplitude > self.min_amplitude
    }
}

/// Starting point for the solver, derived from the data.
pub fn initial_guess(series: &ValidSeries) -> SigmoidParams {
    let (rfu_min, rfu_max) = min_max(&series.rfu).unwrap_or_default();
    let range = rfu_max - rfu_min;
    SigmoidParams::new(
        range * 1.1,
        STEEPNESS_GUESS,
        series.cycles[series.len() / 2],
        rfu_min,
    )
}

/// Box bounds scaled to the observed cycle and response ranges.
///
/// A flat trace has a zero response range, which collapses the amplitude
/// interval; that is rejected as [`SolverError::InvalidBounds`].
pub fn parameter_bounds(series: &ValidSeries) -> Result<Bounds, SolverError> {
    let (rfu_min, rfu_max) = min_max(&series.rfu).unwrap_or_default();
    let (cycle_min, cycle_max) = min_max(&series.cycles).unwrap_or_default();
    let range = rfu_max - rfu_min;
    Bounds::new(
        vec![range * 0.1, STEEPNESS_BOUNDS.0, cycle_min, rfu_min - range * 0.1],
        vec![range * 5.0, STEEPNESS_BOUNDS.1, cycle_max, rfu_max],
    )
}

/// Fits the four-parameter sigmoid with a pluggable solver.
#[derive(Debug, Clone)]
pub struct CurveFitter<S = ProjectedLevenbergMarquardt> {
    solver: S,
}

impl CurveFitter {
    pub fn new() -> Self {
        Self::with_solver(ProjectedLevenbergMarquardt::default())
    }

    /// Default solver with a custom evaluation cap.
    pub fn with_max_evaluations(max_evaluations: usize) -> Self {
        Self::with_solver(ProjectedLevenbergMarquardt::with_max_evaluations(max_evaluations))
    }
}

impl Default for CurveFitter {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BoundedLeastSquares> CurveFitter<S> {
    pub fn with_solver(solver: S) -> Self {
        Self { solver }
    }

    /// Fit one well and compute its quality metrics.
    pub fn fit(&self, cycles: &[f64], rfu: &[f64]) -> Result<CurveFit, FitError> {
        let series = ValidSeries::from_raw(cycles, rfu)?;

        let guess = initial_guess(&series);
        let bounds = parameter_bounds(&series)?;
        let solution = self
            .solver
            .solve(&SigmoidModel, &series.cycles, &series.rfu, &guess.to_array(), &bounds)?;

        let params = SigmoidParams::from_slice(&solution.params).ok_or_else(|| {
            SolverError::DimensionMismatch(format!("expected 4 parameters, got {}", solution.params.len()))
        })?;
        let parameter_errors: [f64; 4] = solution.standard_errors().as_slice().try_into().map_err(|_| {
            SolverError::DimensionMismatch("covariance is not 4x4".to_string())
        })?;

        let fitted_curve = evaluate_curve(&series.cycles, &params);
        let r2 = r2_score(&series.rfu, &fitted_curve);
        let rmse = rmse(&series.rfu, &fitted_curve);

        let (rfu_min, rfu_max) = min_max(&series.rfu).unwrap_or_default();
        let (cycle_min, cycle_max) = min_max(&series.cycles).unwrap_or_default();
        let thresholds = QualityThresholds::for_series(rfu_max - rfu_min, series.len());

        Ok(CurveFit {
            r2_score: r2,
            rmse,
            amplitude: params.amplitude,
            steepness: params.steepness,
            midpoint: params.midpoint,
            baseline: params.baseline,
            is_good_scurve: thresholds.is_good_scurve(r2, &params),
            fit_parameters: params.to_array(),
            parameter_errors,
            fitted_curve,
            data_points: series.len(),
            cycle_range: cycle_max - cycle_min,
        })
    }
}

/// Fit one well with the default solver settings.
pub fn analyze_curve_quality(cycles: &[f64], rfu: &[f64]) -> Result<CurveFit, FitError> {
    CurveFitter::new().fit(cycles, rfu)
}
