//! Boundary between the composition functions and the provisioning engine.
//!
//! [`traits`] defines the [`ResourceProvider`](traits::ResourceProvider) seam
//! every backend implements. [`recording`] ships an in-memory backend that
//! records a deterministic plan instead of calling cloud APIs. [`gcp`] names the
//! resource and function type tokens used by the stack.

#![warn(missing_docs, clippy::pedantic)]

pub mod gcp;
pub mod recording;
pub mod traits;
