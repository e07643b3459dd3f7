//! Google Cloud infrastructure components facade.
//!
//! Bundles the workspace crates behind feature flags so a stack program can
//! depend on one crate and enable only what it uses.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export resource names, type tokens, and URNs.
pub use infra_primitives as primitives;

/// Defaults documents, the struct default applier, and stack inputs (enabled by
/// `config` feature).
#[cfg(feature = "config")]
pub use infra_config as config;

/// Provisioning engine boundary and the recording backend (enabled by
/// `provider` feature).
#[cfg(feature = "provider")]
pub use infra_provider as provider;

/// Composition functions and the deployment driver (enabled by `components`
/// feature).
#[cfg(feature = "components")]
pub use infra_components as components;

/// Logging setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use infra_telemetry as telemetry;
