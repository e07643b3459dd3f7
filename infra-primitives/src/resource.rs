//! Resource names, type tokens, and URNs.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = 100;
const MAX_TOKEN_LEN: usize = 128;

/// Logical name of a resource or component within a stack.
///
/// Names become part of the resource [`Urn`], so the URN separators `:` and `$`
/// are rejected along with whitespace and control characters.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// Creates a validated resource name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResourceName`] if the name is empty, too long, or
    /// contains a reserved character.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Derives a logical name from free-form text such as a display name.
    ///
    /// Reserved characters become `-` and the result is cut to the length
    /// limit, so any text with at least one character yields a valid name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResourceName`] if `text` is empty.
    pub fn from_display(text: &str) -> Result<Self> {
        let name: String = text
            .trim()
            .chars()
            .map(|c| if is_reserved(c) { '-' } else { c })
            .scan(0, |len, c| {
                *len += c.len_utf8();
                (*len <= MAX_NAME_LEN).then_some(c)
            })
            .collect();
        Self::new(name)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ResourceName> for String {
    fn from(value: ResourceName) -> Self {
        value.0
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidResourceName {
            name: String::new(),
            reason: "name cannot be empty".into(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidResourceName {
            name: name.into(),
            reason: format!("name length must be <= {MAX_NAME_LEN}"),
        });
    }

    if let Some(c) = name.chars().find(|&c| is_reserved(c)) {
        return Err(Error::InvalidResourceName {
            name: name.into(),
            reason: format!("name cannot contain {c:?}"),
        });
    }

    Ok(())
}

fn is_reserved(c: char) -> bool {
    matches!(c, ':' | '$') || c.is_whitespace() || c.is_control()
}

/// Fully qualified type token, e.g. `gcp:compute/network:Network` or
/// `pkg:google:gke-cluster`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// Creates a validated type token of the form `package:module:member`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResourceType`] if the token does not have exactly
    /// three non-empty segments or contains unsupported characters.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        validate_token(&token)?;
        Ok(Self(token))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the package segment (`gcp`, `pkg`, `pulumi`, ...).
    #[must_use]
    pub fn package(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// Returns the member segment, the last part of the token.
    #[must_use]
    pub fn member(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_token(token: &str) -> Result<()> {
    let reject = |reason: &str| Error::InvalidResourceType {
        token: token.into(),
        reason: reason.into(),
    };

    if token.len() > MAX_TOKEN_LEN {
        return Err(reject(&format!("token length must be <= {MAX_TOKEN_LEN}")));
    }

    let segments: Vec<&str> = token.split(':').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(reject("token must have the form package:module:member"));
    }

    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '/' | '-' | '_' | '.'))
    {
        return Err(reject(
            "token must contain ascii alphanumeric, colon, slash, dash, underscore, or dot",
        ));
    }

    Ok(())
}

/// Unique address of a resource within a stack.
///
/// Rendered as `urn:infra:<stack>::<project>::<qualified type>::<name>`, where the
/// qualified type chains the parent component types with `$`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Urn {
    stack: String,
    project: String,
    qualified_type: String,
    name: ResourceName,
}

impl Urn {
    /// Builds the URN of a resource, optionally nested under a parent.
    #[must_use]
    pub fn new(
        stack: &str,
        project: &str,
        parent: Option<&Urn>,
        type_token: &ResourceType,
        name: &ResourceName,
    ) -> Self {
        let qualified_type = match parent {
            Some(parent) => format!("{}${}", parent.qualified_type, type_token),
            None => type_token.to_string(),
        };
        Self {
            stack: stack.to_owned(),
            project: project.to_owned(),
            qualified_type,
            name: name.clone(),
        }
    }

    /// Returns the logical resource name.
    #[must_use]
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// Returns the type chain, parent types first.
    #[must_use]
    pub fn qualified_type(&self) -> &str {
        &self.qualified_type
    }
}

impl Display for Urn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "urn:infra:{}::{}::{}::{}",
            self.stack, self.project, self.qualified_type, self.name
        )
    }
}

impl Serialize for Urn {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
