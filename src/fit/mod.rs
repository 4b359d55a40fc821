//! Per-well sigmoid fitting.
//!
//! Responsibilities:
//!
//! - derive initial guesses and adaptive bounds from the data
//! - run the bounded least-squares solver
//! - compute fit metrics and classify the well as a good / poor S-curve

pub mod fitter;

pub use fitter::*;
