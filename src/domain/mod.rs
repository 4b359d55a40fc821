//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - per-well input (`WellSample`) and its finite-filtered view (`ValidSeries`)
//! - per-well outputs (`CurveFit`, `FitOutcome`, `AnomalyTag`, `WellAnalysis`)
//! - run-level outputs (`CycleInfo`, `BatchSummary`, `BatchReport`)
//! - run configuration (`AnalysisConfig`)

pub mod series;
pub mod types;

pub use series::*;
pub use types::*;
