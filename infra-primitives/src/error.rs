//! Shared error definitions for infrastructure primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided run identifier could not be parsed.
    #[error("invalid run id: {source}")]
    InvalidRunId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Logical resource name failed validation.
    #[error("invalid resource name `{name}`: {reason}")]
    InvalidResourceName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Resource type token failed validation.
    #[error("invalid resource type `{token}`: {reason}")]
    InvalidResourceType {
        /// The offending token.
        token: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
