//! Structured logging for stack programs.
//!
//! Libraries in this workspace only emit `tracing` events; binaries call
//! [`init`] once to install a `tracing-subscriber` formatter.

#![warn(missing_docs, clippy::pedantic)]

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when neither the configuration nor `RUST_LOG` provides one.
pub const DEFAULT_FILTER: &str = "info";

/// Output layout of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single line with all fields.
    #[default]
    Full,
    /// Single line, abbreviated.
    Compact,
    /// Multi-line, for humans at a terminal.
    Pretty,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Compact => "compact",
            Self::Pretty => "pretty",
        })
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            other => Err(TelemetryError::UnknownFormat {
                format: other.to_owned(),
            }),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// `EnvFilter` directives; `RUST_LOG` is consulted when absent.
    pub filter: Option<String>,
    /// Output layout.
    pub format: LogFormat,
    /// Disables ANSI colours.
    pub no_color: bool,
}

impl TelemetryConfig {
    /// Sets the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the output layout.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Builds the filter: explicit directives, then `RUST_LOG`, then
    /// [`DEFAULT_FILTER`].
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidFilter`] when explicit directives do not
    /// parse. A malformed `RUST_LOG` falls back to the default instead.
    pub fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        match &self.filter {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TelemetryError::InvalidFilter {
                    directives: directives.clone(),
                    reason: err.to_string(),
                })
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Filter directives did not parse.
    #[error("invalid log filter `{directives}`: {reason}")]
    InvalidFilter {
        /// Offending directives.
        directives: String,
        /// Parser message.
        reason: String,
    },

    /// The requested log format is not known.
    #[error("unknown log format `{format}`; expected full, compact, or pretty")]
    UnknownFormat {
        /// Offending format name.
        format: String,
    },

    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {reason}")]
    Install {
        /// Reason reported by `tracing-subscriber`.
        reason: String,
    },
}

/// Result alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for bad directives and
/// [`TelemetryError::Install`] when a subscriber is already set.
pub fn init(config: &TelemetryConfig) -> TelemetryResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter()?)
        .with_ansi(!config.no_color)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|err| TelemetryError::Install {
        reason: err.to_string(),
    })?;

    tracing::debug!(format = %config.format, "log subscriber installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
        assert!(matches!(
            "json".parse::<LogFormat>(),
            Err(TelemetryError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: TelemetryConfig = serde_yaml::from_str("format: compact\n").unwrap();
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.filter.is_none());
        assert!(!config.no_color);
    }

    #[test]
    fn explicit_filter_is_validated() {
        let config = TelemetryConfig::default().with_filter("infra_components=debug,info");
        assert!(config.env_filter().is_ok());

        let err = TelemetryConfig::default()
            .with_filter("infra=verbose")
            .env_filter()
            .expect_err("unknown level");
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }

    #[test]
    fn second_install_fails() {
        let config = TelemetryConfig::default().with_filter("warn");
        init(&config).expect("first install");
        assert!(matches!(init(&config), Err(TelemetryError::Install { .. })));
    }
}
