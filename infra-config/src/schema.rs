//! Stack inputs supplied by the deployment tool.
//!
//! Stack files follow the usual layout of a `config:` mapping whose keys may be
//! prefixed with the project namespace:
//!
//! ```yaml
//! config:
//!   infra:orgId: "123456789012"
//!   infra:folderName: mcg-demo
//!   infra:regions: [europe-west1]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{DefaultsDocument, describe, load_defaults_document};

/// Default project identifier created by the stack.
pub const DEFAULT_PROJECT_ID: &str = "mcg-demo-h38hr1";
/// Default project display name and logical resource name.
pub const DEFAULT_PROJECT_NAME: &str = "mcg-demo";
/// Default region list.
pub const DEFAULT_REGIONS: &[&str] = &["europe-west1"];
/// APIs enabled on the project unless overridden.
pub const DEFAULT_SERVICES: &[&str] = &[
    "container.googleapis.com",
    "artifactregistry.googleapis.com",
    "dns.googleapis.com",
];
/// Disk size requested for node pools unless overridden.
pub const DEFAULT_NODE_DISK_SIZE_GB: i64 = 80;

// Subnetworks are carved as 10.<index>.0.0/16.
const MAX_REGIONS: usize = 256;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Scalar rendered as text.
    Scalar(String),
    /// Sequence of scalars rendered as text.
    List(Vec<String>),
}

/// Named configuration values for one stack.
#[derive(Debug, Clone, Default)]
pub struct ConfigValues {
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigValues {
    /// Creates an empty set of values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the `config` mapping of a stack file, stripping `namespace:`
    /// prefixes.
    ///
    /// # Errors
    ///
    /// Returns the loader errors of [`load_defaults_document`] and
    /// [`ConfigError::InvalidValue`] for entries that are not scalars or lists
    /// of scalars.
    pub fn from_stack_file(path: impl AsRef<Path>, namespace: &str) -> ConfigResult<Self> {
        let path = path.as_ref();
        let document = load_defaults_document(path)?;
        let values = Self::from_document(&document, namespace)?;
        debug!(
            path = %path.display(),
            namespace,
            keys = values.values.len(),
            "loaded stack configuration"
        );
        Ok(values)
    }

    /// Reads the `config` mapping of an already parsed stack document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when `config` is not a mapping or
    /// holds nested mappings.
    pub fn from_document(document: &DefaultsDocument, namespace: &str) -> ConfigResult<Self> {
        let mut values = Self::new();
        let Some(config) = document.lookup(&["config"]) else {
            return Ok(values);
        };
        let Some(entries) = config.as_object() else {
            if config.is_null() {
                return Ok(values);
            }
            return Err(ConfigError::invalid_value(
                "config",
                format!("expected a mapping, found {}", describe(config)),
            ));
        };

        let prefix = format!("{namespace}:");
        for (key, value) in entries {
            let key = key.strip_prefix(&prefix).unwrap_or(key);
            values
                .values
                .insert(key.to_owned(), convert_value(key, value)?);
        }
        Ok(values)
    }

    /// Sets a scalar value, replacing any previous entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(key.into(), ConfigValue::Scalar(value.into()));
    }

    /// Applies a `key=value` override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the assignment has no `=` or
    /// an empty key.
    pub fn apply_override(&mut self, assignment: &str) -> ConfigResult<()> {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(ConfigError::invalid_value(
                assignment,
                "override must have the form key=value",
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::invalid_value(
                assignment,
                "override key cannot be empty",
            ));
        }
        self.set(key, value.trim());
        Ok(())
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Returns a required, non-empty scalar.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingValue`] when the key is absent or blank and
    /// [`ConfigError::InvalidValue`] when it holds a list.
    pub fn require_str(&self, key: &str) -> ConfigResult<&str> {
        self.get_str(key)?
            .ok_or_else(|| ConfigError::MissingValue { key: key.to_owned() })
    }

    /// Returns an optional scalar; blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the key holds a list.
    pub fn get_str(&self, key: &str) -> ConfigResult<Option<&str>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(ConfigValue::Scalar(value)) if value.trim().is_empty() => Ok(None),
            Some(ConfigValue::Scalar(value)) => Ok(Some(value)),
            Some(ConfigValue::List(_)) => Err(ConfigError::invalid_value(
                key,
                "expected a scalar, found a list",
            )),
        }
    }

    /// Returns an optional list. A scalar is split on commas.
    ///
    /// # Errors
    ///
    /// This accessor accepts both shapes and currently never fails; it returns a
    /// result to match the other accessors.
    pub fn get_list(&self, key: &str) -> ConfigResult<Option<Vec<String>>> {
        Ok(match self.values.get(key) {
            None => None,
            Some(ConfigValue::List(items)) => Some(items.clone()),
            Some(ConfigValue::Scalar(value)) => Some(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
        })
    }

    /// Returns an optional integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the value does not parse.
    pub fn get_i64(&self, key: &str) -> ConfigResult<Option<i64>> {
        self.get_str(key)?
            .map(|raw| {
                raw.parse::<i64>()
                    .map_err(|err| ConfigError::invalid_value(key, err.to_string()))
            })
            .transpose()
    }
}

fn convert_value(key: &str, value: &Value) -> ConfigResult<ConfigValue> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| scalar_text(key, item))
            .collect::<ConfigResult<_>>()
            .map(ConfigValue::List),
        other => scalar_text(key, other).map(ConfigValue::Scalar),
    }
}

fn scalar_text(key: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ConfigError::invalid_value(
            key,
            format!("expected a scalar, found {}", describe(other)),
        )),
    }
}

/// Inputs of the stack program, validated before any resource is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    org_id: String,
    folder_name: String,
    billing_account: String,
    billing_service_account: String,
    project_id: String,
    project_name: String,
    regions: Vec<String>,
    services: Vec<String>,
    node_disk_size_gb: i64,
}

impl StackConfig {
    /// Builds the stack inputs from named values.
    ///
    /// Required keys: `orgId`, `folderName`, `billingAC`, `billingSA`. Optional
    /// keys: `projectId`, `projectName`, `regions`, `services`, `nodeDiskSizeGb`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingValue`] for an absent required key and
    /// [`ConfigError::InvalidValue`] for malformed optional values.
    pub fn from_values(values: &ConfigValues) -> ConfigResult<Self> {
        let org_id = values.require_str("orgId")?.to_owned();
        let folder_name = values.require_str("folderName")?.to_owned();
        let billing_account = values.require_str("billingAC")?.to_owned();
        let billing_service_account = values.require_str("billingSA")?.to_owned();

        let project_id = values
            .get_str("projectId")?
            .unwrap_or(DEFAULT_PROJECT_ID)
            .to_owned();
        let project_name = values
            .get_str("projectName")?
            .unwrap_or(DEFAULT_PROJECT_NAME)
            .to_owned();

        let regions = values
            .get_list("regions")?
            .unwrap_or_else(|| owned(DEFAULT_REGIONS));
        if regions.is_empty() {
            return Err(ConfigError::invalid_value(
                "regions",
                "at least one region must be specified",
            ));
        }
        if regions.len() > MAX_REGIONS {
            return Err(ConfigError::invalid_value(
                "regions",
                format!("at most {MAX_REGIONS} regions are supported"),
            ));
        }

        let services = values
            .get_list("services")?
            .unwrap_or_else(|| owned(DEFAULT_SERVICES));

        let node_disk_size_gb = values
            .get_i64("nodeDiskSizeGb")?
            .unwrap_or(DEFAULT_NODE_DISK_SIZE_GB);
        if node_disk_size_gb < 0 {
            return Err(ConfigError::invalid_value(
                "nodeDiskSizeGb",
                "disk size cannot be negative",
            ));
        }

        Ok(Self {
            org_id,
            folder_name,
            billing_account,
            billing_service_account,
            project_id,
            project_name,
            regions,
            services,
            node_disk_size_gb,
        })
    }

    /// Organization that owns the folder.
    #[must_use]
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    /// Display name of the folder.
    #[must_use]
    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    /// Billing account linked to the project.
    #[must_use]
    pub fn billing_account(&self) -> &str {
        &self.billing_account
    }

    /// Service account impersonated to create the project and link billing.
    #[must_use]
    pub fn billing_service_account(&self) -> &str {
        &self.billing_service_account
    }

    /// Globally unique project identifier.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Project display name.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Regions that receive a subnetwork, cluster, node pool, and NAT.
    #[must_use]
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// APIs enabled on the project.
    #[must_use]
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Disk size requested for node pools; `0` leaves it to the defaults.
    #[must_use]
    pub const fn node_disk_size_gb(&self) -> i64 {
        self.node_disk_size_gb
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}
