//! Four-parameter sigmoid used for qPCR amplification curves.
//!
//! ```text
//! y(x) = L / (1 + exp(-k (x - x0))) + B
//! ```
//!
//! - `L`: amplitude (baseline to plateau)
//! - `k`: steepness of the exponential phase
//! - `x0`: midpoint cycle (half amplitude)
//! - `B`: baseline
//!
//! The fitter needs two primitives: the model value and its partial derivatives
//! with respect to the parameters (the Jacobian row). Both live here.

use serde::{Deserialize, Serialize};

/// A model whose parameters can be estimated by least squares.
pub trait ParametricModel {
    /// Number of free parameters.
    fn param_count(&self) -> usize;

    /// Model value at `x`.
    fn value(&self, x: f64, params: &[f64]) -> f64;

    /// Partial derivatives of the model value at `x`, written into `out`.
    ///
    /// `out` has length `param_count()`.
    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]);
}

/// Fitted (or generating) sigmoid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidParams {
    pub amplitude: f64,
    pub steepness: f64,
    pub midpoint: f64,
    pub baseline: f64,
}

impl SigmoidParams {
    pub fn new(amplitude: f64, steepness: f64, midpoint: f64, baseline: f64) -> Self {
        Self {
            amplitude,
            steepness,
            midpoint,
            baseline,
        }
    }

    /// Parameters in solver order `[L, k, x0, B]`.
    pub fn to_array(self) -> [f64; 4] {
        [self.amplitude, self.steepness, self.midpoint, self.baseline]
    }

    /// Inverse of [`SigmoidParams::to_array`]. Returns `None` on a length mismatch.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [l, k, x0, b] => Some(Self::new(*l, *k, *x0, *b)),
            _ => None,
        }
    }

    /// Evaluate the curve at a single cycle.
    pub fn at(&self, x: f64) -> f64 {
        sigmoid(x, self.amplitude, self.steepness, self.midpoint, self.baseline)
    }
}

/// `L / (1 + exp(-k (x - x0))) + B`.
pub fn sigmoid(x: f64, l: f64, k: f64, x0: f64, b: f64) -> f64 {
    l * logistic(k * (x - x0)) + b
}

/// Evaluate the sigmoid element-wise over a cycle sequence.
pub fn evaluate_curve(cycles: &[f64], params: &SigmoidParams) -> Vec<f64> {
    cycles.iter().map(|&x| params.at(x)).collect()
}

/// Standard logistic `1 / (1 + exp(-z))`.
///
/// Branching on the sign keeps `exp` from overflowing for large `|z|`.
fn logistic(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// The sigmoid as a [`ParametricModel`] with parameters `[L, k, x0, B]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigmoidModel;

impl ParametricModel for SigmoidModel {
    fn param_count(&self) -> usize {
        4
    }

    fn value(&self, x: f64, params: &[f64]) -> f64 {
        sigmoid(x, params[0], params[1], params[2], params[3])
    }

    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]) {
        let (l, k, x0) = (params[0], params[1], params[2]);
        let s = logistic(k * (x - x0));
        let ds = s * (1.0 - s);
        out[0] = s;
        out[1] = l * ds * (x - x0);
        out[2] = -l * ds * k;
        out[3] = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_is_half_amplitude_above_baseline() {
        let p = SigmoidParams::new(1000.0, 0.7, 22.0, 150.0);
        assert!((p.at(22.0) - 650.0).abs() < 1e-9);
    }

    #[test]
    fn extreme_arguments_stay_finite() {
        let p = SigmoidParams::new(500.0, 10.0, 20.0, 10.0);
        assert!((p.at(-1.0e6) - 10.0).abs() < 1e-9);
        assert!((p.at(1.0e6) - 510.0).abs() < 1e-9);
    }

    #[test]
    fn evaluate_curve_keeps_length() {
        let cycles: Vec<f64> = (1..=40).map(f64::from).collect();
        let p = SigmoidParams::new(800.0, 0.5, 25.0, 90.0);
        assert_eq!(evaluate_curve(&cycles, &p).len(), cycles.len());
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let model = SigmoidModel;
        let params = [900.0, 0.6, 18.0, 120.0];
        let mut analytic = [0.0; 4];
        for &x in &[5.0, 17.5, 18.0, 30.0] {
            model.gradient(x, &params, &mut analytic);
            for j in 0..4 {
                let h = 1e-6 * params[j].abs().max(1.0);
                let mut up = params;
                let mut down = params;
                up[j] += h;
                down[j] -= h;
                let numeric = (model.value(x, &up) - model.value(x, &down)) / (2.0 * h);
                assert!(
                    (numeric - analytic[j]).abs() < 1e-4 * numeric.abs().max(1.0),
                    "param {j} at x={x}: numeric={numeric} analytic={}",
                    analytic[j]
                );
            }
        }
    }

    #[test]
    fn params_round_trip_through_solver_order() {
        let p = SigmoidParams::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(SigmoidParams::from_slice(&p.to_array()), Some(p));
        assert_eq!(SigmoidParams::from_slice(&[1.0, 2.0]), None);
    }
}
