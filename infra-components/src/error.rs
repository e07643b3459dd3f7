//! Error type for composition functions.

use infra_config::ConfigError;
use infra_provider::traits::ProviderError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Errors surfaced by composition functions and the deployment driver.
///
/// Every variant is transparent: the first error raised anywhere below is what
/// the caller sees.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Configuration, defaults, or I/O failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure returned by the provisioning engine.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A resource name or type token failed validation.
    #[error(transparent)]
    Primitive(#[from] infra_primitives::Error),

    /// The deployment lifecycle rejected a transition.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Result alias for composition functions.
pub type ComponentResult<T> = Result<T, ComponentError>;
