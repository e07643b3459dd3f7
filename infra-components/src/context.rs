//! Stack-wide context shared by every composition function.

use std::fmt;
use std::sync::Arc;

use infra_config::Defaulter;
use infra_primitives::{ResourceName, ResourceType, RunId, Urn};
use infra_provider::traits::{
    ComponentRegistration, Properties, ProviderRef, ResourceProvider, ResourceRequest,
    ResourceState,
};
use serde_json::Value;
use tracing::debug;

use crate::error::{ComponentError, ComponentResult};

/// Options accepted by every composition function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentOptions {
    parent: Option<Urn>,
    provider: Option<ProviderRef>,
}

impl ComponentOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Nests the resource under `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: Urn) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Routes the resource through an explicit provider.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderRef) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Enclosing component.
    #[must_use]
    pub fn parent(&self) -> Option<&Urn> {
        self.parent.as_ref()
    }

    /// Explicit provider.
    #[must_use]
    pub fn provider(&self) -> Option<&ProviderRef> {
        self.provider.as_ref()
    }
}

/// A registered logical component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentResource {
    urn: Urn,
    type_token: ResourceType,
}

impl ComponentResource {
    /// Address of the component.
    #[must_use]
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Component type token.
    #[must_use]
    pub fn type_token(&self) -> &ResourceType {
        &self.type_token
    }

    /// Options for child resources: parented here, inheriting the provider.
    #[must_use]
    pub fn child_options(&self, opts: &ComponentOptions) -> ComponentOptions {
        ComponentOptions {
            parent: Some(self.urn.clone()),
            provider: opts.provider.clone(),
        }
    }
}

/// Handle composition functions use to reach the provisioning engine.
#[derive(Clone)]
pub struct StackContext {
    stack: String,
    project: String,
    run_id: RunId,
    provider: Arc<dyn ResourceProvider>,
    defaulter: Defaulter,
}

impl fmt::Debug for StackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackContext")
            .field("stack", &self.stack)
            .field("project", &self.project)
            .field("run_id", &self.run_id)
            .field("provider", &self.provider.metadata().name())
            .finish_non_exhaustive()
    }
}

impl StackContext {
    /// Creates a context for one run of `project`/`stack`.
    #[must_use]
    pub fn new(
        stack: impl Into<String>,
        project: impl Into<String>,
        provider: Arc<dyn ResourceProvider>,
        defaulter: Defaulter,
    ) -> Self {
        Self {
            stack: stack.into(),
            project: project.into(),
            run_id: RunId::random(),
            provider,
            defaulter,
        }
    }

    /// Stack name.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Project name used in URNs.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Identifier of this run.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Defaulter applied to component arguments.
    #[must_use]
    pub fn defaulter(&self) -> &Defaulter {
        &self.defaulter
    }

    fn urn(&self, parent: Option<&Urn>, type_token: &ResourceType, name: &ResourceName) -> Urn {
        Urn::new(&self.stack, &self.project, parent, type_token, name)
    }

    /// Registers a logical component.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Primitive`] for an invalid name or token and
    /// propagates provider failures unchanged.
    pub async fn register_component(
        &self,
        type_token: &str,
        name: &str,
        opts: &ComponentOptions,
    ) -> ComponentResult<ComponentResource> {
        let type_token = ResourceType::new(type_token)?;
        let name = ResourceName::new(name)?;
        let urn = self.urn(opts.parent(), &type_token, &name);

        debug!(%urn, "registering component");
        self.provider
            .register_component(&ComponentRegistration {
                urn: urn.clone(),
                type_token: type_token.clone(),
                parent: opts.parent().cloned(),
            })
            .await?;

        Ok(ComponentResource { urn, type_token })
    }

    /// Creates a resource from a JSON object of inputs.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Primitive`] for an invalid name or token and
    /// propagates provider failures unchanged.
    pub async fn create(
        &self,
        type_token: &str,
        name: &str,
        properties: Value,
        opts: &ComponentOptions,
    ) -> ComponentResult<ResourceState> {
        let type_token = ResourceType::new(type_token)?;
        let name = ResourceName::new(name)?;
        let urn = self.urn(opts.parent(), &type_token, &name);

        debug!(%urn, "creating resource");
        let request = ResourceRequest::new(urn, type_token, name)
            .with_properties(properties)?
            .with_parent(opts.parent().cloned())
            .with_provider(opts.provider().cloned());

        self.provider
            .create(request)
            .await
            .map_err(ComponentError::from)
    }

    /// Calls a provider function.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Provider`] when `args` is not an object or the
    /// call fails.
    pub async fn invoke(&self, token: &str, args: Value) -> ComponentResult<Properties> {
        let token = ResourceType::new(token)?;
        let Value::Object(args) = args else {
            return Err(infra_provider::traits::ProviderError::invalid_request(format!(
                "arguments of `{token}` must be an object"
            ))
            .into());
        };

        debug!(%token, "invoking function");
        Ok(self.provider.invoke(&token, args).await?)
    }
}

#[cfg(test)]
mod tests {
    use infra_config::Precedence;
    use infra_provider::gcp;
    use infra_provider::recording::RecordingProvider;
    use serde_json::json;

    use super::*;

    fn context(provider: &Arc<RecordingProvider>) -> StackContext {
        StackContext::new(
            "dev",
            "infra",
            Arc::clone(provider) as Arc<dyn ResourceProvider>,
            Defaulter::new(Precedence::AnnotationOnly),
        )
    }

    #[tokio::test]
    async fn children_inherit_parent_and_provider() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider);

        let billing = ctx
            .create(gcp::PROVIDER, "billing", json!({ "accessToken": "t" }), &ComponentOptions::new())
            .await
            .unwrap();
        let opts = ComponentOptions::new().with_provider(ProviderRef::from_state(&billing));

        let component = ctx
            .register_component("pkg:google:project", "demo", &opts)
            .await
            .unwrap();
        let child = component.child_options(&opts);
        let project = ctx
            .create(gcp::PROJECT, "demo", json!({ "projectId": "demo-1" }), &child)
            .await
            .unwrap();

        assert!(project.urn().to_string().contains("pkg:google:project$gcp:organizations"));

        let plan = provider.plan();
        let step = plan.created(gcp::PROJECT).next().unwrap();
        assert_eq!(step.parent.as_ref(), Some(component.urn()));
        assert_eq!(step.provider.as_ref(), Some(billing.urn()));
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_before_the_provider() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider);

        let err = ctx
            .create(gcp::NETWORK, "bad name", json!({}), &ComponentOptions::new())
            .await
            .expect_err("whitespace");
        assert!(matches!(err, ComponentError::Primitive(_)));

        let err = ctx.invoke(gcp::GET_ACCOUNT_ACCESS_TOKEN, json!([])).await.expect_err("array");
        assert!(matches!(err, ComponentError::Provider(_)));
        assert!(provider.plan().is_empty());
    }
}
