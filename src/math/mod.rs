//! Numerical utilities: descriptive statistics and bounded least squares.

pub mod lsq;
pub mod stats;

pub use lsq::*;
pub use stats::*;
