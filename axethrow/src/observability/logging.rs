//! Logging initialization.
//!
//! Structured logging via `tracing` with human-readable and JSON output.
//! `AXETHROW_LOG_LEVEL` overrides the verbosity flags.
//!
//! The entity feed polls the host console several times a second and the
//! host bridge traces every console line it reads, so `-vvv` keeps those two
//! modules at `debug`. Only `-vvvv` shows the raw poll traffic.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Per-poll console traffic, hidden below the top verbosity.
const POLL_TRAFFIC_QUIET: &str = "trace,axethrow::host::stdio=debug,axethrow::tracking=debug";

/// Maps a verbosity level to a tracing filter.
///
/// - 0 → `"warn"`
/// - 1 → `"info"` (session start/end, setup, runtime lifecycle)
/// - 2 → `"debug"` (hits, waves, timer decisions)
/// - 3 → `"trace"` except console polling
/// - 4+ → `"trace"` (saturates)
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        3 => POLL_TRAFFIC_QUIET,
        _ => "trace",
    }
}

/// Initializes the global tracing subscriber, writing to stderr.
///
/// `AXETHROW_LOG_LEVEL` takes precedence over `verbosity` when set.
/// Uses `try_init()`, so repeated calls are harmless.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env("AXETHROW_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn init_logging_does_not_panic() {
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
        init_logging(LogFormat::Json, 3, ColorChoice::Never);
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(verbosity_to_directive(0), "warn");
        assert_eq!(verbosity_to_directive(1), "info");
        assert_eq!(verbosity_to_directive(2), "debug");
        assert_eq!(verbosity_to_directive(4), "trace");
        assert_eq!(verbosity_to_directive(255), "trace");
    }

    #[test]
    fn poll_traffic_needs_top_verbosity() {
        let directive = verbosity_to_directive(3);
        assert!(directive.starts_with("trace,"));
        assert!(directive.contains("axethrow::tracking=debug"));
        assert!(directive.contains("axethrow::host::stdio=debug"));
        // Every level parses as a filter.
        for verbosity in 0..=4 {
            assert!(EnvFilter::try_new(verbosity_to_directive(verbosity)).is_ok());
        }
    }
}
