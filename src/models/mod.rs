//! Growth models for amplification traces.
//!
//! Models are small, pure functions so that the solver and the fitter can stay
//! generic over the curve shape.

pub mod sigmoid;

pub use sigmoid::*;
