//! In-memory provider that records a plan instead of calling cloud APIs.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use infra_primitives::{ResourceType, Urn};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::gcp;
use crate::traits::{
    ComponentRegistration, Properties, ProviderError, ProviderMetadata, ProviderResult,
    ResourceProvider, ResourceRequest, ResourceState,
};

const COMPUTE_API: &str = "https://www.googleapis.com/compute/v1";

/// Property keys whose values never reach the plan.
pub const CREDENTIAL_KEYS: &[&str] = &["accessToken"];
/// Placeholder recorded in place of a credential.
pub const REDACTED: &str = "<redacted>";

/// Kind of operation recorded in a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOperation {
    /// Component registration.
    Register,
    /// Resource creation.
    Create,
    /// Provider function call.
    Invoke,
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    /// Position in the plan, starting at 1.
    pub sequence: usize,
    /// Operation kind.
    pub operation: PlanOperation,
    /// Resource, component, or function type token.
    pub token: ResourceType,
    /// Address of the resource or component; absent for invokes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urn: Option<Urn>,
    /// Enclosing component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    /// Explicit provider resource the operation went through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Urn>,
    /// Inputs or function arguments.
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub inputs: Properties,
    /// Outputs or function results.
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub outputs: Properties,
}

impl PlanStep {
    /// Logical name of the resource or component, if the step has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.urn.as_ref().map(|urn| urn.name().as_str())
    }
}

/// Ordered record of every operation a deployment issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// All steps in issue order.
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Created resources of the given type, in creation order.
    pub fn created<'a>(&'a self, type_token: &'a str) -> impl Iterator<Item = &'a PlanStep> + 'a {
        self.steps.iter().filter(move |step| {
            step.operation == PlanOperation::Create && step.token.as_str() == type_token
        })
    }

    /// Position of the first step for the named resource of the given type.
    #[must_use]
    pub fn position(&self, type_token: &str, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.token.as_str() == type_token && step.name() == Some(name))
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    steps: Vec<PlanStep>,
    urns: HashSet<String>,
    failures: HashMap<String, ProviderError>,
    next_id: u64,
}

impl RecordingState {
    fn claim(&mut self, urn: &Urn) -> ProviderResult<()> {
        if !self.urns.insert(urn.to_string()) {
            return Err(ProviderError::Conflict {
                urn: urn.to_string(),
            });
        }
        Ok(())
    }

    fn record(&mut self, mut step: PlanStep) {
        step.sequence = self.steps.len() + 1;
        self.steps.push(step);
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Deterministic preview backend.
///
/// Every operation is appended to a [`Plan`]. Outputs that downstream resources
/// read (`name`, `selfLink`, `email`, `accessToken`, ...) are synthesised from
/// the inputs so a whole stack can be walked without credentials. Values under
/// [`CREDENTIAL_KEYS`] are returned to the caller but recorded as [`REDACTED`].
#[derive(Debug)]
pub struct RecordingProvider {
    metadata: ProviderMetadata,
    state: Mutex<RecordingState>,
}

impl Default for RecordingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingProvider {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: ProviderMetadata::new("recording").with_version(env!("CARGO_PKG_VERSION")),
            state: Mutex::new(RecordingState::default()),
        }
    }

    /// Makes the next operation on the resource or component named `name` fail
    /// with `error`. The failure fires once.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_on(&self, name: impl Into<String>, error: ProviderError) {
        self.lock().failures.insert(name.into(), error);
    }

    /// Returns a copy of the plan recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn plan(&self) -> Plan {
        Plan {
            steps: self.lock().steps.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().expect("recording provider poisoned")
    }
}

#[async_trait]
impl ResourceProvider for RecordingProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn register_component(&self, registration: &ComponentRegistration) -> ProviderResult<()> {
        let mut state = self.lock();
        if let Some(error) = state.failures.remove(registration.urn.name().as_str()) {
            warn!(urn = %registration.urn, %error, "injected failure");
            return Err(error);
        }
        state.claim(&registration.urn)?;

        debug!(urn = %registration.urn, "recorded component");
        state.record(PlanStep {
            sequence: 0,
            operation: PlanOperation::Register,
            token: registration.type_token.clone(),
            urn: Some(registration.urn.clone()),
            parent: registration.parent.clone(),
            provider: None,
            inputs: Properties::new(),
            outputs: Properties::new(),
        });
        Ok(())
    }

    async fn create(&self, request: ResourceRequest) -> ProviderResult<ResourceState> {
        let mut state = self.lock();
        if let Some(error) = state.failures.remove(request.name().as_str()) {
            warn!(urn = %request.urn(), %error, "injected failure");
            return Err(error);
        }
        state.claim(request.urn())?;

        let numeric_id = state.next_id();
        let (id, outputs) = synthesize(&request, numeric_id);

        debug!(urn = %request.urn(), %id, "recorded resource");
        state.record(PlanStep {
            sequence: 0,
            operation: PlanOperation::Create,
            token: request.type_token().clone(),
            urn: Some(request.urn().clone()),
            parent: request.parent().cloned(),
            provider: request.provider().map(|provider| provider.urn().clone()),
            inputs: redact(request.properties()),
            outputs: redact(&outputs),
        });

        Ok(ResourceState::new(
            request.urn().clone(),
            id,
            request.type_token().clone(),
            outputs,
        ))
    }

    async fn invoke(&self, token: &ResourceType, args: Properties) -> ProviderResult<Properties> {
        let mut state = self.lock();
        let outputs = match token.as_str() {
            gcp::GET_ACCOUNT_ACCESS_TOKEN => {
                let account = args
                    .get("targetServiceAccount")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProviderError::invalid_request("targetServiceAccount is required")
                    })?;
                let serial = state.next_id();
                let mut outputs = Properties::new();
                outputs.insert("accessToken".into(), json!(format!("recorded-token-{serial}")));
                outputs.insert("targetServiceAccount".into(), json!(account));
                outputs
            }
            other => {
                return Err(ProviderError::invalid_request(format!(
                    "function `{other}` is not supported by the recording provider"
                )));
            }
        };

        debug!(%token, "recorded invoke");
        state.record(PlanStep {
            sequence: 0,
            operation: PlanOperation::Invoke,
            token: token.clone(),
            urn: None,
            parent: None,
            provider: None,
            // results are not kept
            inputs: redact(&args),
            outputs: Properties::new(),
        });
        Ok(outputs)
    }
}

fn redact(properties: &Properties) -> Properties {
    let mut recorded = properties.clone();
    for key in CREDENTIAL_KEYS {
        if let Some(value) = recorded.get_mut(*key) {
            *value = json!(REDACTED);
        }
    }
    recorded
}

fn synthesize(request: &ResourceRequest, numeric_id: u64) -> (String, Properties) {
    let mut outputs = request.properties().clone();
    let str_input = |key: &str| {
        request
            .properties()
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    let name = match request.properties().get("name").and_then(Value::as_str) {
        Some(name) => name.to_owned(),
        None => request.name().to_string(),
    };
    let project = str_input("project");

    let id = match request.type_token().as_str() {
        gcp::FOLDER => {
            let folder = format!("folders/{numeric_id}");
            outputs.insert("folderId".into(), json!(numeric_id.to_string()));
            outputs.insert("name".into(), json!(folder));
            return (folder, outputs);
        }
        gcp::PROJECT => {
            outputs.insert("number".into(), json!(numeric_id.to_string()));
            str_input("projectId")
        }
        gcp::NETWORK => {
            let path = format!("projects/{project}/global/networks/{name}");
            outputs.insert("selfLink".into(), json!(format!("{COMPUTE_API}/{path}")));
            path
        }
        gcp::SUBNETWORK | gcp::ROUTER => {
            let collection = if request.type_token().as_str() == gcp::ROUTER {
                "routers"
            } else {
                "subnetworks"
            };
            let region = str_input("region");
            let path = format!("projects/{project}/regions/{region}/{collection}/{name}");
            outputs.insert("selfLink".into(), json!(format!("{COMPUTE_API}/{path}")));
            path
        }
        gcp::SERVICE_ACCOUNT => {
            let email = format!("{}@{project}.iam.gserviceaccount.com", str_input("accountId"));
            outputs.insert("email".into(), json!(email));
            format!("projects/{project}/serviceAccounts/{email}")
        }
        gcp::CLUSTER | gcp::NODE_POOL => {
            format!("projects/{project}/locations/{}/{name}", str_input("location"))
        }
        _ => format!("{name}-{numeric_id}"),
    };

    outputs.insert("name".into(), json!(name));
    outputs.insert("id".into(), json!(id));
    (id, outputs)
}

#[cfg(test)]
mod tests {
    use infra_primitives::ResourceName;

    use super::*;

    fn request(token: &str, name: &str, properties: Value) -> ResourceRequest {
        let type_token = ResourceType::new(token).unwrap();
        let name = ResourceName::new(name).unwrap();
        let urn = Urn::new("dev", "infra", None, &type_token, &name);
        ResourceRequest::new(urn, type_token, name)
            .with_properties(properties)
            .unwrap()
    }

    #[tokio::test]
    async fn records_creates_in_order_with_outputs() {
        let provider = RecordingProvider::new();

        let vpc = provider
            .create(request(gcp::NETWORK, "vpc", json!({ "project": "p1" })))
            .await
            .unwrap();
        let subnet = provider
            .create(request(
                gcp::SUBNETWORK,
                "sn-0",
                json!({ "project": "p1", "region": "europe-west1", "network": vpc.output_str("selfLink").unwrap() }),
            ))
            .await
            .unwrap();

        assert_eq!(
            vpc.output_str("selfLink").unwrap(),
            "https://www.googleapis.com/compute/v1/projects/p1/global/networks/vpc"
        );
        assert_eq!(
            subnet.id(),
            "projects/p1/regions/europe-west1/subnetworks/sn-0"
        );

        let plan = provider.plan();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[0].sequence, 1);
        assert_eq!(plan.steps()[1].name(), Some("sn-0"));
        assert!(plan.position(gcp::NETWORK, "vpc") < plan.position(gcp::SUBNETWORK, "sn-0"));
    }

    #[tokio::test]
    async fn folder_and_service_account_outputs() {
        let provider = RecordingProvider::new();

        let folder = provider
            .create(request(gcp::FOLDER, "mcg", json!({ "displayName": "mcg" })))
            .await
            .unwrap();
        assert_eq!(folder.output_str("name").unwrap(), "folders/1");

        let account = provider
            .create(request(
                gcp::SERVICE_ACCOUNT,
                "gke-np-0",
                json!({ "project": "p1", "accountId": "svc-gke-np-0" }),
            ))
            .await
            .unwrap();
        assert_eq!(
            account.output_str("email").unwrap(),
            "svc-gke-np-0@p1.iam.gserviceaccount.com"
        );
    }

    #[tokio::test]
    async fn credentials_stay_out_of_the_plan() {
        let provider = RecordingProvider::new();
        let billing_user = provider
            .create(request(
                gcp::PROVIDER,
                "googlebillinguser",
                json!({ "accessToken": "ya29.secret" }),
            ))
            .await
            .unwrap();
        assert_eq!(billing_user.output_str("accessToken").unwrap(), "ya29.secret");

        let plan = provider.plan();
        let step = &plan.steps()[0];
        assert_eq!(step.inputs["accessToken"], json!(REDACTED));
        assert_eq!(step.outputs["accessToken"], json!(REDACTED));
        assert!(!serde_json::to_string(&plan).unwrap().contains("ya29.secret"));
    }

    #[tokio::test]
    async fn duplicate_urn_conflicts() {
        let provider = RecordingProvider::new();
        provider
            .create(request(gcp::NETWORK, "vpc", json!({})))
            .await
            .unwrap();

        let err = provider
            .create(request(gcp::NETWORK, "vpc", json!({})))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, ProviderError::Conflict { .. }));
        assert_eq!(provider.plan().len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let provider = RecordingProvider::new();
        provider.fail_on("vpc", ProviderError::permission_denied("compute.networks.create"));

        let err = provider
            .create(request(gcp::NETWORK, "vpc", json!({})))
            .await
            .expect_err("injected");
        assert!(matches!(err, ProviderError::PermissionDenied { .. }));
        assert!(provider.plan().is_empty());

        provider
            .create(request(gcp::NETWORK, "vpc", json!({})))
            .await
            .expect("second attempt succeeds");
    }

    #[tokio::test]
    async fn invoke_access_token() {
        let provider = RecordingProvider::new();
        let token = ResourceType::new(gcp::GET_ACCOUNT_ACCESS_TOKEN).unwrap();

        let mut args = Properties::new();
        args.insert("targetServiceAccount".into(), json!("billing@seed.iam.gserviceaccount.com"));
        let result = provider.invoke(&token, args).await.unwrap();
        assert!(result["accessToken"].as_str().unwrap().starts_with("recorded-token-"));

        let plan = provider.plan();
        assert_eq!(plan.steps()[0].operation, PlanOperation::Invoke);
        assert!(plan.steps()[0].outputs.is_empty());

        let err = provider
            .invoke(&token, Properties::new())
            .await
            .expect_err("missing account");
        assert!(matches!(err, ProviderError::InvalidRequest { .. }));

        let unknown = ResourceType::new("gcp:compute/getZones:getZones").unwrap();
        assert!(provider.invoke(&unknown, Properties::new()).await.is_err());
    }
}
