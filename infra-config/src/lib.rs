//! Configuration management for infrastructure components.
//!
//! Three concerns live here: loading YAML defaults documents ([`loader`]),
//! filling unset fields of configuration structs ([`defaults`]), and reading the
//! named inputs a stack needs before it creates anything ([`schema`]).

#![warn(missing_docs, clippy::pedantic)]

// Lets `#[derive(ApplyDefaults)]` resolve `::infra_config` inside this crate's own tests.
extern crate self as infra_config;

pub mod defaults;
mod error;
pub mod loader;
pub mod schema;

pub use defaults::{
    AppliedDefault, ApplyDefaults, DefaultSource, DefaultableField, Defaulter, DefaultsContext,
    DefaultsReport, FieldKind, Precedence,
};
pub use error::{ConfigError, ConfigResult};
/// Derives [`ApplyDefaults`] from `#[defaults(...)]` field attributes.
pub use infra_config_macros::ApplyDefaults;
pub use loader::{DefaultsDocument, load_defaults_document};
pub use schema::{ConfigValue, ConfigValues, StackConfig};
