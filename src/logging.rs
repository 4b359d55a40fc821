//! Tracing subscriber setup for the `qpcr` binary.
//!
//! Logs go to stderr so that stdout stays reserved for the report. The filter
//! comes from `QPCR_LOG` when set (any `EnvFilter` directive, e.g.
//! `qpcr_curves::batch=debug`); otherwise from the CLI verbosity.

use std::io::IsTerminal;
use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "QPCR_LOG";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// CLI verbosity, mapped to a default filter level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    pub fn default_directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("tracing already initialised")]
    AlreadyInitialised,
    #[error("invalid {LOG_ENV} filter: {0}")]
    Filter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Build the filter: `QPCR_LOG` if present and non-empty, else the verbosity level.
pub fn build_filter(env_value: Option<&str>, verbosity: Verbosity) -> Result<EnvFilter, InitError> {
    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).map_err(|e| InitError::Filter(e.to_string())),
        None => Ok(EnvFilter::new(verbosity.default_directive())),
    }
}

/// Configure the global tracing subscriber. Call once, after `.env` is loaded.
pub fn init_tracing(verbosity: Verbosity) -> Result<(), InitError> {
    INITIALISED.set(()).map_err(|_| InitError::AlreadyInitialised)?;

    let env_value = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_value.as_deref(), verbosity)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| InitError::Install(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false).default_directive(), "info");
    }

    #[test]
    fn env_directive_overrides_verbosity() {
        use tracing_subscriber::filter::LevelFilter;

        let filter = build_filter(Some("qpcr_curves=trace"), Verbosity::Quiet).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

        let fallback = build_filter(Some("  "), Verbosity::Verbose).unwrap();
        assert_eq!(fallback.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn malformed_directive_is_an_error() {
        assert!(matches!(
            build_filter(Some("qpcr_curves=notalevel"), Verbosity::Normal),
            Err(InitError::Filter(_))
        ));
    }
}
