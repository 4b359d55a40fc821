//! Bounded nonlinear least squares.
//!
//! The curve fitter only needs a narrow contract from its solver:
//!
//! ```text
//! (model, x, y, initial guess, box bounds) -> (params, covariance) | failure
//! ```
//!
//! [`BoundedLeastSquares`] captures that contract so the numerics can be swapped
//! without touching the fitter. [`ProjectedLevenbergMarquardt`] is the default
//! implementation:
//!
//! - Marquardt-scaled damped Gauss-Newton steps on the normal equations
//! - every trial point is projected onto the box
//! - parameters pinned at a bound with the descent direction pointing outward are
//!   frozen for that step (a tiny active set), so free parameters keep moving
//! - a hard cap on model evaluations; running out is a typed failure, never a hang
//!
//! Normal equations are solved with Cholesky and fall back to SVD with
//! progressively looser tolerances for near-singular systems.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::models::ParametricModel;

/// Model evaluation cap used when none is configured.
pub const DEFAULT_MAX_EVALUATIONS: usize = 5000;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const DIAG_FLOOR: f64 = 1e-12;

/// Failure modes of a bounded least-squares solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("each lower bound must be strictly less than each upper bound (parameter {index}: [{lower}, {upper}])")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("too few points for least squares: {points} points for {params} parameters")]
    TooFewPoints { points: usize, params: usize },
    #[error("optimal parameters not found: number of evaluations exceeded {evaluations}")]
    NonConvergence { evaluations: usize },
    #[error("residuals or jacobian are not finite")]
    NonFinite,
    #[error("normal equations are singular")]
    Singular,
}

/// Box constraints `lower[i] <= p[i] <= upper[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Build bounds, rejecting degenerate or inverted intervals.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, SolverError> {
        if lower.len() != upper.len() {
            return Err(SolverError::DimensionMismatch(format!(
                "{} lower bounds vs {} upper bounds",
                lower.len(),
                upper.len()
            )));
        }
        for (index, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            // `!(lo < hi)` also rejects NaN.
            if !(lo < hi) {
                return Err(SolverError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Project `params` onto the box in place.
    pub fn clamp(&self, params: &mut [f64]) {
        for ((p, &lo), &hi) in params.iter_mut().zip(&self.lower).zip(&self.upper) {
            *p = p.clamp(lo, hi);
        }
    }

    /// `true` for parameters pinned at a bound while `direction` points outward.
    fn blocked(&self, params: &[f64], direction: &[f64]) -> Vec<bool> {
        params
            .iter()
            .zip(direction)
            .enumerate()
            .map(|(i, (&p, &d))| (p <= self.lower[i] && d < 0.0) || (p >= self.upper[i] && d > 0.0))
            .collect()
    }
}

/// Converged solution of a bounded least-squares problem.
#[derive(Debug, Clone)]
pub struct LsqSolution {
    pub params: Vec<f64>,
    /// Parameter covariance estimate, `(JᵀJ)⁺ · SSR / (n - p)`.
    pub covariance: DMatrix<f64>,
    /// Sum of squared residuals at the solution.
    pub ssr: f64,
    /// Number of model evaluations spent.
    pub evaluations: usize,
}

impl LsqSolution {
    /// One-sigma parameter errors, `sqrt(diag(covariance))`.
    pub fn standard_errors(&self) -> Vec<f64> {
        self.covariance.diagonal().iter().map(|v| v.sqrt()).collect()
    }
}

/// Narrow solver contract used by the curve fitter.
pub trait BoundedLeastSquares {
    /// Minimise `Σ (y_i - model(x_i, p))²` subject to `bounds`, starting from `initial`.
    fn solve<M: ParametricModel + ?Sized>(
        &self,
        model: &M,
        x: &[f64],
        y: &[f64],
        initial: &[f64],
        bounds: &Bounds,
    ) -> Result<LsqSolution, SolverError>;
}

/// Projected Levenberg-Marquardt solver.
#[derive(Debug, Clone)]
pub struct ProjectedLevenbergMarquardt {
    /// Hard cap on model evaluations (residual vector computations).
    pub max_evaluations: usize,
    /// Relative reduction in SSR below which the solve is converged.
    pub ftol: f64,
    /// Relative step length below which the solve is converged.
    pub xtol: f64,
    /// Infinity norm of the projected gradient below which the solve is converged.
    pub gtol: f64,
}

impl Default for ProjectedLevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
        }
    }
}

impl ProjectedLevenbergMarquardt {
    pub fn with_max_evaluations(max_evaluations: usize) -> Self {
        Self {
            max_evaluations: max_evaluations.max(1),
            ..Self::default()
        }
    }
}

impl BoundedLeastSquares for ProjectedLevenbergMarquardt {
    fn solve<M: ParametricModel + ?Sized>(
        &self,
        model: &M,
        x: &[f64],
        y: &[f64],
        initial: &[f64],
        bounds: &Bounds,
    ) -> Result<LsqSolution, SolverError> {
        let m = model.param_count();
        let n = x.len();
        if y.len() != n {
            return Err(SolverError::DimensionMismatch(format!("{n} x values vs {} y values", y.len())));
        }
        if initial.len() != m || bounds.len() != m {
            return Err(SolverError::DimensionMismatch(format!(
                "model has {m} parameters, initial guess {}, bounds {}",
                initial.len(),
                bounds.len()
            )));
        }
        if n < m {
            return Err(SolverError::TooFewPoints { points: n, params: m });
        }

        let mut p = initial.to_vec();
        bounds.clamp(&mut p);

        let mut evaluations = 1;
        let mut r = residuals(model, x, y, &p).ok_or(SolverError::NonFinite)?;
        let mut jac = jacobian(model, x, &p).ok_or(SolverError::NonFinite)?;
        let mut ssr = r.norm_squared();
        let mut lambda = LAMBDA_INIT;

        'outer: loop {
            if ssr == 0.0 {
                break;
            }

            let jt = jac.transpose();
            let mut g = &jt * &r;
            let blocked = bounds.blocked(&p, g.as_slice());
            for (i, &b) in blocked.iter().enumerate() {
                if b {
                    g[i] = 0.0;
                }
            }
            if g.amax() <= self.gtol {
                break;
            }

            let a = &jt * &jac;
            loop {
                if evaluations >= self.max_evaluations {
                    return Err(SolverError::NonConvergence { evaluations });
                }

                let mut damped = a.clone();
                for i in 0..m {
                    if blocked[i] {
                        for k in 0..m {
                            damped[(i, k)] = 0.0;
                            damped[(k, i)] = 0.0;
                        }
                        damped[(i, i)] = 1.0;
                    } else {
                        damped[(i, i)] += lambda * a[(i, i)].max(DIAG_FLOOR);
                    }
                }
                let step = solve_normal_equations(&damped, &g).ok_or(SolverError::Singular)?;

                let mut trial: Vec<f64> = p.iter().zip(step.iter()).map(|(pi, si)| pi + si).collect();
                bounds.clamp(&mut trial);

                evaluations += 1;
                let trial_r = residuals(model, x, y, &trial);
                let trial_ssr = trial_r.as_ref().map(|r| r.norm_squared());

                match (trial_r, trial_ssr) {
                    (Some(trial_r), Some(trial_ssr)) if trial_ssr < ssr => {
                        let moved = trial
                            .iter()
                            .zip(&p)
                            .map(|(a, b)| (a - b) * (a - b))
                            .sum::<f64>()
                            .sqrt();
                        let reduction = (ssr - trial_ssr) / ssr;

                        p = trial;
                        r = trial_r;
                        ssr = trial_ssr;
                        jac = jacobian(model, x, &p).ok_or(SolverError::NonFinite)?;
                        lambda = (lambda / 10.0).max(LAMBDA_MIN);

                        let scale = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                        if reduction <= self.ftol || moved <= self.xtol * (self.xtol + scale) {
                            break 'outer;
                        }
                        continue 'outer;
                    }
                    _ => {
                        lambda *= 10.0;
                        if lambda > LAMBDA_MAX {
                            // No damping level improves the cost: a (bounded) minimum.
                            break 'outer;
                        }
                    }
                }
            }
        }

        let covariance = covariance_estimate(&jac, ssr, n, m);
        Ok(LsqSolution {
            params: p,
            covariance,
            ssr,
            evaluations,
        })
    }
}

fn residuals<M: ParametricModel + ?Sized>(model: &M, x: &[f64], y: &[f64], params: &[f64]) -> Option<DVector<f64>> {
    let r = DVector::from_iterator(x.len(), x.iter().zip(y).map(|(&xi, &yi)| yi - model.value(xi, params)));
    if r.iter().all(|v| v.is_finite()) { Some(r) } else { None }
}

/// Jacobian of the model values (not the residuals), one row per point.
fn jacobian<M: ParametricModel + ?Sized>(model: &M, x: &[f64], params: &[f64]) -> Option<DMatrix<f64>> {
    let m = model.param_count();
    let mut jac = DMatrix::<f64>::zeros(x.len(), m);
    let mut row = vec![0.0; m];
    for (i, &xi) in x.iter().enumerate() {
        model.gradient(xi, params, &mut row);
        for (j, &v) in row.iter().enumerate() {
            jac[(i, j)] = v;
        }
    }
    if jac.iter().all(|v| v.is_finite()) { Some(jac) } else { None }
}

fn solve_normal_equations(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    solve_least_squares(a, b)
}

/// Solve a (possibly ill-conditioned) linear least-squares problem using SVD.
///
/// Returns `None` if the system cannot be solved to a finite vector.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if a strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// `(JᵀJ)⁺ · SSR / (n - p)` with the pseudo-inverse taken through the SVD of `J`.
///
/// Singular values below `eps · max(n, p) · σ_max` are discarded. Without
/// residual degrees of freedom the covariance is undefined and reported as `+∞`.
fn covariance_estimate(jac: &DMatrix<f64>, ssr: f64, n: usize, m: usize) -> DMatrix<f64> {
    let undefined = DMatrix::from_element(m, m, f64::INFINITY);
    if n <= m {
        return undefined;
    }

    let svd = jac.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return undefined;
    };
    let s = &svd.singular_values;
    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    let threshold = f64::EPSILON * n.max(m) as f64 * s_max;

    let mut cov = DMatrix::<f64>::zeros(m, m);
    for (k, &sk) in s.iter().enumerate() {
        if sk <= threshold {
            continue;
        }
        let inv = 1.0 / (sk * sk);
        for i in 0..m {
            for j in 0..m {
                cov[(i, j)] += v_t[(k, i)] * v_t[(k, j)] * inv;
            }
        }
    }

    let s_sq = ssr / (n - m) as f64;
    let cov = cov * s_sq;
    if cov.iter().any(|v| v.is_nan()) {
        return undefined;
    }
    cov
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SigmoidModel, SigmoidParams};

    /// `y = a + b x`, used to check the solver on a problem with a closed form.
    struct Line;

    impl ParametricModel for Line {
        fn param_count(&self) -> usize {
            2
        }
        fn value(&self, x: f64, p: &[f64]) -> f64 {
            p[0] + p[1] * x
        }
        fn gradient(&self, x: f64, _p: &[f64], out: &mut [f64]) {
            out[0] = 1.0;
            out[1] = x;
        }
    }

    fn wide_bounds(m: usize) -> Bounds {
        Bounds::new(vec![-1e6; m], vec![1e6; m]).unwrap()
    }

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn bounds_reject_degenerate_intervals() {
        let err = Bounds::new(vec![0.0, 1.0], vec![0.0, 2.0]).unwrap_err();
        assert!(matches!(err, SolverError::InvalidBounds { index: 0, .. }));
        assert!(Bounds::new(vec![f64::NAN], vec![1.0]).is_err());
        assert!(Bounds::new(vec![0.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn line_fit_recovers_coefficients_and_errors() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let noise = [0.1, -0.1, 0.05, -0.05, 0.0, 0.1, -0.1, 0.05, -0.05, 0.0];
        let y: Vec<f64> = x.iter().zip(&noise).map(|(xi, e)| 1.5 + 0.5 * xi + e).collect();

        let solution = ProjectedLevenbergMarquardt::default()
            .solve(&Line, &x, &y, &[0.0, 0.0], &wide_bounds(2))
            .unwrap();

        assert!((solution.params[0] - 1.5).abs() < 0.1);
        assert!((solution.params[1] - 0.5).abs() < 0.02);
        let errors = solution.standard_errors();
        assert!(errors.iter().all(|e| e.is_finite() && *e > 0.0));
    }

    #[test]
    fn active_bound_is_respected() {
        // Unconstrained slope would be 2.0; cap it at 1.0.
        let x: Vec<f64> = (0..8).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|xi| 2.0 * xi).collect();
        let bounds = Bounds::new(vec![-100.0, -100.0], vec![100.0, 1.0]).unwrap();

        let solution = ProjectedLevenbergMarquardt::default()
            .solve(&Line, &x, &y, &[0.0, 0.0], &bounds)
            .unwrap();

        assert!(solution.params[1] <= 1.0);
        assert!((solution.params[1] - 1.0).abs() < 1e-9);
        // Best intercept given slope 1: mean(y - x) = mean(x) = 3.5.
        assert!((solution.params[0] - 3.5).abs() < 1e-6);
    }

    #[test]
    fn sigmoid_fit_from_nearby_guess() {
        let truth = SigmoidParams::new(1000.0, 0.8, 20.0, 100.0);
        let x: Vec<f64> = (1..=40).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|&c| truth.at(c)).collect();
        let bounds = Bounds::new(vec![100.0, 0.01, 1.0, 0.0], vec![5000.0, 10.0, 40.0, 1100.0]).unwrap();

        let solution = ProjectedLevenbergMarquardt::default()
            .solve(&SigmoidModel, &x, &y, &[1100.0, 0.5, 21.0, 100.0], &bounds)
            .unwrap();

        for (fitted, expected) in solution.params.iter().zip(truth.to_array()) {
            assert!((fitted - expected).abs() < 1e-3 * expected.abs().max(1.0));
        }
    }

    #[test]
    fn evaluation_cap_surfaces_as_non_convergence() {
        let truth = SigmoidParams::new(1000.0, 0.8, 20.0, 100.0);
        let x: Vec<f64> = (1..=40).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|&c| truth.at(c)).collect();
        let bounds = Bounds::new(vec![100.0, 0.01, 1.0, 0.0], vec![5000.0, 10.0, 40.0, 1100.0]).unwrap();

        let err = ProjectedLevenbergMarquardt::with_max_evaluations(2)
            .solve(&SigmoidModel, &x, &y, &[1100.0, 0.5, 30.0, 100.0], &bounds)
            .unwrap_err();
        assert!(matches!(err, SolverError::NonConvergence { .. }));
    }

    #[test]
    fn too_few_points_is_rejected() {
        let err = ProjectedLevenbergMarquardt::default()
            .solve(&Line, &[1.0], &[2.0], &[0.0, 0.0], &wide_bounds(2))
            .unwrap_err();
        assert_eq!(err, SolverError::TooFewPoints { points: 1, params: 2 });
    }

    #[test]
    fn covariance_without_dof_is_infinite() {
        let x = [0.0, 1.0];
        let y = [1.0, 3.0];
        let solution = ProjectedLevenbergMarquardt::default()
            .solve(&Line, &x, &y, &[0.0, 0.0], &wide_bounds(2))
            .unwrap();
        assert!(solution.standard_errors().iter().all(|e| e.is_infinite()));
    }
}
