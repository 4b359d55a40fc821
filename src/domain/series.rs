//! Shared validation of a single `(cycles, rfu)` series.
//!
//! Both the curve fitter and the anomaly detector re-validate their input
//! independently, with the same two steps:
//!
//! 1. at least [`MIN_POINTS`] raw points
//! 2. at least [`MIN_POINTS`] points left after dropping non-finite pairs

use thiserror::Error;

/// Minimum number of points a series needs to be analysed.
pub const MIN_POINTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("Insufficient data points")]
    InsufficientData { points: usize },
    #[error("Insufficient valid data points")]
    InsufficientValidData { points: usize },
}

/// A series with only finite `(cycle, rfu)` pairs, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSeries {
    pub cycles: Vec<f64>,
    pub rfu: Vec<f64>,
}

impl ValidSeries {
    /// Validate and filter a raw series.
    ///
    /// Pairs are zipped, so a length mismatch only considers the common prefix;
    /// the batch pre-flight check rejects such inputs before they get here.
    pub fn from_raw(cycles: &[f64], rfu: &[f64]) -> Result<Self, SeriesError> {
        if cycles.len() < MIN_POINTS || rfu.len() < MIN_POINTS {
            return Err(SeriesError::InsufficientData {
                points: cycles.len().min(rfu.len()),
            });
        }

        let (cycles, rfu): (Vec<f64>, Vec<f64>) = cycles
            .iter()
            .zip(rfu)
            .filter(|(c, r)| c.is_finite() && r.is_finite())
            .map(|(&c, &r)| (c, r))
            .unzip();

        if cycles.len() < MIN_POINTS {
            return Err(SeriesError::InsufficientValidData { points: cycles.len() });
        }
        Ok(Self { cycles, rfu })
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }
}
