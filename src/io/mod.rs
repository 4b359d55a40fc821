//! Input/output helpers.
//!
//! - JSON / wide-CSV ingest (`ingest`)
//! - pre-flight structural validation (`validate`)
//! - per-well CSV export (`export`)
//! - JSON run document (`report`)

pub mod export;
pub mod ingest;
pub mod report;
pub mod validate;

pub use export::*;
pub use ingest::*;
pub use report::*;
pub use validate::*;
