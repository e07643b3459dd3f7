//! Core shared types for the infrastructure composition crates.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod resource;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier of a single deployment run.
pub use ids::RunId;
/// Resource naming and addressing.
pub use resource::{ResourceName, ResourceType, Urn};
