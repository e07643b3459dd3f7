//! Error types for configuration loading and default application.

use std::path::PathBuf;

use thiserror::Error;

use crate::defaults::FieldKind;

/// Errors emitted while loading configuration or applying defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be opened or read in full.
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Source [`std::io::Error`].
        #[source]
        source: std::io::Error,
    },

    /// The document is not UTF-8 or not well-formed YAML.
    #[error("failed to parse `{origin}`: {source}")]
    Parse {
        /// File path or other description of the document origin.
        origin: String,
        /// Source [`serde_yaml::Error`].
        #[source]
        source: serde_yaml::Error,
    },

    /// Well-formed YAML that cannot be represented as a JSON-compatible mapping.
    #[error("failed to convert `{origin}`: {reason}")]
    Conversion {
        /// File path or other description of the document origin.
        origin: String,
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// A default value could not be converted to the field's type.
    #[error("invalid default for `{path}` ({kind}) from {value}: {reason}")]
    InvalidDefault {
        /// Dotted path of the field.
        path: String,
        /// Semantic type expected by the field.
        kind: FieldKind,
        /// Offending value, rendered as text.
        value: String,
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// A required configuration value was absent or empty.
    #[error("missing required configuration value `{key}`")]
    MissingValue {
        /// Name of the missing key.
        key: String,
    },

    /// A configuration value was present but unusable.
    #[error("invalid configuration value `{key}`: {reason}")]
    InvalidValue {
        /// Name of the offending key.
        key: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl ConfigError {
    /// Helper to construct [`ConfigError::InvalidValue`] from string-like values.
    #[must_use]
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
