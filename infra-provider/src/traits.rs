//! Provider trait and the request/state records exchanged across it.

use async_trait::async_trait;
use infra_primitives::{ResourceName, ResourceType, Urn};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result alias used by provider implementations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Resource inputs and outputs, keyed by property name.
pub type Properties = Map<String, Value>;

/// Error type shared by provider implementations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider is misconfigured or missing credentials.
    #[error("provider not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// The request was rejected before reaching the cloud API.
    #[error("invalid resource request: {reason}")]
    InvalidRequest {
        /// Reason describing why the request could not be processed.
        reason: String,
    },

    /// The caller lacks permission for the operation.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// Additional context from the API.
        reason: String,
    },

    /// A quota or rate limit was exceeded.
    #[error("quota exceeded: {reason}")]
    QuotaExceeded {
        /// Additional context from the API.
        reason: String,
    },

    /// A resource with the same address already exists.
    #[error("resource `{urn}` already exists")]
    Conflict {
        /// Address of the conflicting resource.
        urn: String,
    },

    /// Transport-level failures (network, protocol, etc.).
    #[error("provider transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The provider returned a response without the expected data.
    #[error("provider response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },

    /// A resource name or type token failed validation.
    #[error(transparent)]
    Primitive(#[from] infra_primitives::Error),
}

impl ProviderError {
    /// Convenience constructor for invalid requests.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for permission failures.
    #[must_use]
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// Minimal metadata describing a provider backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderMetadata {
    name: &'static str,
    version: Option<String>,
}

impl ProviderMetadata {
    /// Creates metadata for the named backend.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            version: None,
        }
    }

    /// Sets the backend version information.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Returns the backend identifier (e.g., "recording").
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the backend version, if known.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Reference to an explicit provider resource that child resources should use
/// instead of the ambient credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderRef {
    urn: Urn,
    id: String,
}

impl ProviderRef {
    /// Builds a reference from the provider resource state.
    #[must_use]
    pub fn from_state(state: &ResourceState) -> Self {
        Self {
            urn: state.urn.clone(),
            id: state.id.clone(),
        }
    }

    /// Address of the provider resource.
    #[must_use]
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Identifier assigned to the provider resource.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Registration of a logical component that groups child resources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentRegistration {
    /// Address of the component.
    pub urn: Urn,
    /// Component type token, e.g. `pkg:google:gke-cluster`.
    pub type_token: ResourceType,
    /// Enclosing component, if any.
    pub parent: Option<Urn>,
}

/// Request to create one cloud resource.
#[derive(Clone, Debug)]
pub struct ResourceRequest {
    urn: Urn,
    type_token: ResourceType,
    name: ResourceName,
    parent: Option<Urn>,
    provider: Option<ProviderRef>,
    properties: Properties,
}

impl ResourceRequest {
    /// Starts a request with no inputs.
    #[must_use]
    pub fn new(urn: Urn, type_token: ResourceType, name: ResourceName) -> Self {
        Self {
            urn,
            type_token,
            name,
            parent: None,
            provider: None,
            properties: Properties::new(),
        }
    }

    /// Sets the input properties from a JSON object. Top-level `null` entries are
    /// dropped so that unset optional inputs are not sent.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidRequest`] when `properties` is not an
    /// object.
    pub fn with_properties(mut self, properties: Value) -> ProviderResult<Self> {
        let Value::Object(mut properties) = properties else {
            return Err(ProviderError::invalid_request(format!(
                "properties of `{}` must be an object",
                self.urn
            )));
        };
        properties.retain(|_, value| !value.is_null());
        self.properties = properties;
        Ok(self)
    }

    /// Parents the resource under a component.
    #[must_use]
    pub fn with_parent(mut self, parent: Option<Urn>) -> Self {
        self.parent = parent;
        self
    }

    /// Routes the resource through an explicit provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Option<ProviderRef>) -> Self {
        self.provider = provider;
        self
    }

    /// Address of the resource.
    #[must_use]
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Resource type token.
    #[must_use]
    pub fn type_token(&self) -> &ResourceType {
        &self.type_token
    }

    /// Logical resource name.
    #[must_use]
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// Enclosing component, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Urn> {
        self.parent.as_ref()
    }

    /// Explicit provider, if any.
    #[must_use]
    pub fn provider(&self) -> Option<&ProviderRef> {
        self.provider.as_ref()
    }

    /// Input properties.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// State of a created resource as reported by the provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceState {
    urn: Urn,
    id: String,
    type_token: ResourceType,
    outputs: Properties,
}

impl ResourceState {
    /// Creates the state record for a resource.
    #[must_use]
    pub fn new(urn: Urn, id: impl Into<String>, type_token: ResourceType, outputs: Properties) -> Self {
        Self {
            urn,
            id: id.into(),
            type_token,
            outputs,
        }
    }

    /// Address of the resource.
    #[must_use]
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Provider-assigned identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resource type token.
    #[must_use]
    pub fn type_token(&self) -> &ResourceType {
        &self.type_token
    }

    /// All output properties.
    #[must_use]
    pub fn outputs(&self) -> &Properties {
        &self.outputs
    }

    /// Returns a string output.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Response`] when the output is absent or not a
    /// string.
    pub fn output_str(&self, key: &str) -> ProviderResult<&str> {
        self.outputs
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::response(format!("`{}` has no string output `{key}`", self.urn))
            })
    }
}

/// Provisioning engine seam.
///
/// Implementations perform (or simulate) the cloud API calls. Callers issue one
/// operation at a time and stop at the first error.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Returns metadata describing this backend.
    fn metadata(&self) -> &ProviderMetadata;

    /// Records a logical component.
    async fn register_component(&self, registration: &ComponentRegistration) -> ProviderResult<()>;

    /// Creates a resource and returns its state.
    async fn create(&self, request: ResourceRequest) -> ProviderResult<ResourceState>;

    /// Calls a provider function (data source) and returns its result.
    async fn invoke(&self, token: &ResourceType, args: Properties) -> ProviderResult<Properties>;
}
