//! `qpcr-curves` library crate.
//!
//! The binary (`qpcr`) is a thin wrapper around this library so that the
//! fitting and anomaly logic is testable without spawning processes and can be
//! embedded behind other front-ends.

pub mod anomaly;
pub mod app;
pub mod batch;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
