//! Tracing subscriber setup for hosts that embed Cadence.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! host's choice. [`init_tracing`] is a convenience for hosts without their
//! own setup. The filter comes from `RUST_LOG`, defaulting to `info`.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "compact" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format '{}'. Valid values: text, json", other)),
        }
    }
}

/// Install a global `fmt` subscriber.
///
/// Returns `false` without changing anything when a global subscriber is
/// already installed, so repeated calls are harmless.
pub fn init_tracing(format: LogFormat) -> bool {
    init_tracing_with_default(format, "info")
}

/// Like [`init_tracing`], with `default_directive` used when `RUST_LOG` is
/// unset or invalid.
pub fn init_tracing_with_default(format: LogFormat, default_directive: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = subscriber_fmt().with_env_filter(env_filter).with_target(true);

    let installed = match format {
        LogFormat::Text => subscriber.compact().try_init().is_ok(),
        LogFormat::Json => subscriber.json().try_init().is_ok(),
    };
    if installed {
        tracing::debug!(%format, "Tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" TEXT ".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_format_display_roundtrip() {
        for format in [LogFormat::Text, LogFormat::Json] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_init_tracing_is_repeatable() {
        // The first call may lose to another test; the second never installs.
        let _ = init_tracing(LogFormat::Text);
        assert!(!init_tracing(LogFormat::Json));
    }
}
