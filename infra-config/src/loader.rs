//! YAML defaults documents.
//!
//! A document is read in full, parsed as YAML and converted into a
//! JSON-compatible tree so that lookups behave the same regardless of which YAML
//! spelling (quoted keys, integer keys, tags) the file uses.

use std::fs;
use std::path::Path;

use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Generic key-value tree parsed from a YAML source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DefaultsDocument {
    entries: Map<String, Value>,
}

impl DefaultsDocument {
    /// Wraps an existing JSON mapping.
    #[must_use]
    pub fn from_map(entries: Map<String, Value>) -> Self {
        Self { entries }
    }

    /// Parses a YAML document held in memory.
    ///
    /// `origin` only labels errors and log lines.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not well-formed YAML or its
    /// top level is not a mapping, and [`ConfigError::Conversion`] if the document
    /// holds values that have no JSON representation.
    pub fn from_yaml_str(origin: &str, text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let yaml: YamlValue =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                origin: origin.to_owned(),
                source,
            })?;

        let json = yaml_to_json(yaml).map_err(|reason| ConfigError::Conversion {
            origin: origin.to_owned(),
            reason,
        })?;

        match json {
            Value::Null => Ok(Self::default()),
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(ConfigError::Parse {
                origin: origin.to_owned(),
                source: serde::de::Error::custom(format!(
                    "expected a mapping at the top level, found {}",
                    describe(&other)
                )),
            }),
        }
    }

    /// Resolves a path of keys through nested mappings.
    #[must_use]
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.entries.get(first.as_ref())?;
        for segment in rest {
            current = current.as_object()?.get(segment.as_ref())?;
        }
        Some(current)
    }

    /// Returns the top-level mapping.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Consumes the document, returning the top-level mapping.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.entries
    }

    /// Returns `true` when the document has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads and parses the YAML document at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read in full,
/// [`ConfigError::Parse`] if its bytes are not UTF-8, and the parse or
/// conversion errors of [`DefaultsDocument::from_yaml_str`].
pub fn load_defaults_document(path: impl AsRef<Path>) -> ConfigResult<DefaultsDocument> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|err| ConfigError::Parse {
        origin: origin.clone(),
        source: serde::de::Error::custom(format!("document is not valid UTF-8: {err}")),
    })?;

    let document = DefaultsDocument::from_yaml_str(&origin, &text)?;
    debug!(
        path = %path.display(),
        entries = document.entries.len(),
        "loaded defaults document"
    );
    Ok(document)
}

pub(crate) fn yaml_to_json(value: YamlValue) -> Result<Value, String> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => number_to_json(&n)?,
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut entries = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                entries.insert(key_to_string(key)?, yaml_to_json(value)?);
            }
            Value::Object(entries)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn number_to_json(number: &serde_yaml::Number) -> Result<Value, String> {
    if let Some(i) = number.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(u) = number.as_u64() {
        return Ok(Value::from(u));
    }
    number
        .as_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("number `{number}` has no JSON representation"))
}

fn key_to_string(key: YamlValue) -> Result<String, String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Null => Ok("null".to_owned()),
        YamlValue::Tagged(tagged) => key_to_string(tagged.value),
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => {
            Err("mapping keys must be scalars".to_owned())
        }
    }
}

pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    const NODE_POOL_DEFAULTS: &str = r"
nodeConfig:
  machineType: e2-standard
  diskSizeGb: 90
  diskType: PD-STANDARD
  preemptible: false
oauthScopes:
  - https://www.googleapis.com/auth/cloud-platform
";

    #[test]
    fn loads_mapping_matching_reference_json() {
        let document = DefaultsDocument::from_yaml_str("inline", NODE_POOL_DEFAULTS).unwrap();

        let expected = json!({
            "nodeConfig": {
                "machineType": "e2-standard",
                "diskSizeGb": 90,
                "diskType": "PD-STANDARD",
                "preemptible": false
            },
            "oauthScopes": ["https://www.googleapis.com/auth/cloud-platform"]
        });
        assert_eq!(Value::Object(document.into_map()), expected);
    }

    #[test]
    fn scalar_keys_become_strings_and_tags_are_dropped() {
        let document =
            DefaultsDocument::from_yaml_str("inline", "1: one\ntrue: yes-ish\nzone: !region eu\n")
                .unwrap();

        assert_eq!(document.lookup(&["1"]), Some(&json!("one")));
        assert_eq!(document.lookup(&["true"]), Some(&json!("yes-ish")));
        assert_eq!(document.lookup(&["zone"]), Some(&json!("eu")));
    }

    #[test]
    fn lookup_walks_nested_mappings() {
        let document = DefaultsDocument::from_yaml_str("inline", NODE_POOL_DEFAULTS).unwrap();

        assert_eq!(
            document.lookup(&["nodeConfig", "diskSizeGb"]),
            Some(&json!(90))
        );
        assert_eq!(document.lookup(&["nodeConfig", "missing"]), None);
        assert_eq!(document.lookup(&["oauthScopes", "0"]), None);
        assert_eq!(document.lookup::<&str>(&[]), None);
    }

    #[test]
    fn empty_document_is_empty_mapping() {
        assert!(DefaultsDocument::from_yaml_str("inline", "").unwrap().is_empty());
        assert!(DefaultsDocument::from_yaml_str("inline", "~\n").unwrap().is_empty());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = DefaultsDocument::from_yaml_str("inline", "nodeConfig: [unclosed\n")
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = DefaultsDocument::from_yaml_str("inline", "a: 1\na: 2\n")
            .expect_err("duplicate keys should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn non_mapping_top_level_is_parse_error() {
        let err = DefaultsDocument::from_yaml_str("inline", "- a\n- b\n").expect_err("sequence");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unrepresentable_values_fail_conversion() {
        let err = DefaultsDocument::from_yaml_str("inline", "ratio: .nan\n").expect_err("nan");
        assert!(matches!(err, ConfigError::Conversion { .. }));

        let err = DefaultsDocument::from_yaml_str("inline", "? [a, b]\n: c\n")
            .expect_err("sequence key");
        assert!(matches!(err, ConfigError::Conversion { .. }));
    }

    #[test]
    fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(NODE_POOL_DEFAULTS.as_bytes()).unwrap();

        let document = load_defaults_document(file.path()).unwrap();
        assert_eq!(
            document.lookup(&["nodeConfig", "machineType"]),
            Some(&json!("e2-standard"))
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_defaults_document(dir.path().join("defaults.yaml"))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"nodeConfig:\n  machineType: e2-\xff\xfe\n").unwrap();

        let err = load_defaults_document(file.path()).expect_err("bad bytes");
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
        assert!(err.to_string().contains("UTF-8"));
    }
}
