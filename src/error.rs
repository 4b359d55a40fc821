//! Application-level error carrying a process exit code.
//!
//! Exit codes:
//! - `2`: bad input (unreadable file, malformed batch, failed validation)
//! - `3`: no usable data
//! - `4`: internal failure or output write error
//!
//! Library-level failures (solver, per-well fit) have their own typed errors and
//! never surface here; a failed well is reported inside the batch output.

use thiserror::Error;

#[derive(Clone, Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Input could not be read or failed the pre-flight check.
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// The input parsed but holds nothing to analyze.
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    /// The analysis itself could not run.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    /// Writing an output artifact failed.
    pub fn output(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}
