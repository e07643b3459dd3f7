//! Composition functions for the Google Cloud demo environment.
//!
//! Each function registers a named component through a [`StackContext`] and
//! creates its child resources with a fixed field mapping. [`deploy`] strings
//! them together in dependency order and [`Deployment`] tracks one run of it.

#![warn(missing_docs, clippy::pedantic)]

pub mod cloudnat;
mod context;
mod error;
pub mod gke;
mod lifecycle;
pub mod network;
pub mod project;
mod stack;

pub use context::{ComponentOptions, ComponentResource, StackContext};
pub use error::{ComponentError, ComponentResult};
pub use lifecycle::{DeploymentEvent, DeploymentState, Lifecycle, LifecycleError, LifecycleResult};
pub use stack::{
    BILLING_PROVIDER_NAME, Deployment, DeploymentSummary, NETWORK_NAME, RegionSummary, deploy,
};
