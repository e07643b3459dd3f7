//! GKE clusters and node pools.

use infra_config::{ApplyDefaults, ConfigError};
use infra_primitives::Urn;
use infra_provider::gcp;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::context::{ComponentOptions, StackContext};
use crate::error::ComponentResult;

/// Component type token for clusters.
pub const CLUSTER_COMPONENT: &str = "pkg:google:gke-cluster";
/// Component type token for node pools.
pub const NODE_POOL_COMPONENT: &str = "pkg:google:gke-nodepool";

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Network placement of a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GkeNetworkConfig {
    /// Network self link.
    pub network: String,
    /// Subnetwork self link.
    pub subnetwork: String,
}

/// Inputs for [`new_gke_cluster`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GkeClusterArgs {
    /// Project the cluster lives in.
    pub project_id: String,
    /// Region or zone.
    pub location: String,
    /// Cluster name; the provider derives one from the resource name when absent.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Creates an Autopilot cluster instead of a standard one.
    pub autopilot: bool,
    /// Network placement.
    pub net_config: GkeNetworkConfig,
}

/// Created cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GkeClusterState {
    /// Address of the component.
    pub urn: Urn,
    /// Cluster name node pools attach to.
    pub name: String,
    /// Cluster location.
    pub location: String,
}

/// Creates a cluster. Standard clusters drop the default node pool so node
/// pools can be managed separately.
///
/// # Errors
///
/// Propagates provider failures unchanged.
pub async fn new_gke_cluster(
    ctx: &StackContext,
    name: &str,
    args: &GkeClusterArgs,
    opts: &ComponentOptions,
) -> ComponentResult<GkeClusterState> {
    let component = ctx.register_component(CLUSTER_COMPONENT, name, opts).await?;

    let mut inputs = json!({
        "project": args.project_id,
        "location": args.location,
        "name": args.name,
        "description": args.description,
        "network": args.net_config.network,
        "subnetwork": args.net_config.subnetwork,
    });
    if args.autopilot {
        inputs["enableAutopilot"] = Value::Bool(true);
    } else {
        inputs["removeDefaultNodePool"] = Value::Bool(true);
        inputs["initialNodeCount"] = json!(1);
    }

    let cluster = ctx
        .create(gcp::CLUSTER, name, inputs, &component.child_options(opts))
        .await?;

    let state = GkeClusterState {
        urn: component.urn().clone(),
        name: cluster.output_str("name")?.to_owned(),
        location: cluster.output_str("location")?.to_owned(),
    };
    info!(cluster = %state.name, location = %state.location, "cluster ready");
    Ok(state)
}

/// Machine settings for the nodes of a pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ApplyDefaults)]
#[serde(rename_all = "camelCase")]
#[defaults(rename_all = "camelCase")]
pub struct GkeNodePoolNodeConfig {
    /// Compute Engine machine type.
    #[defaults(value = "e2-standard")]
    pub machine_type: String,
    /// Boot disk size; must be positive once defaults are applied.
    #[defaults(value = "90")]
    pub disk_size_gb: i64,
    /// Boot disk type.
    #[defaults(value = "PD-STANDARD")]
    pub disk_type: String,
}

/// Inputs for [`new_gke_node_pool`].
#[derive(Clone, Debug, Default, PartialEq, Eq, ApplyDefaults)]
#[defaults(rename_all = "camelCase")]
pub struct GkeNodePoolArgs {
    /// Project the pool lives in.
    pub project_id: String,
    /// Cluster location.
    pub location: String,
    /// Cluster name.
    pub cluster: String,
    /// Pool name; the provider derives one from the resource name when absent.
    pub name: Option<String>,
    /// Node machine settings, filled from defaults where unset.
    #[defaults(nested)]
    pub node_config: GkeNodePoolNodeConfig,
}

/// Created node pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GkeNodePoolState {
    /// Address of the component.
    pub urn: Urn,
    /// Email of the service account the nodes run as.
    pub service_account: String,
    /// Node settings after defaults.
    pub node_config: GkeNodePoolNodeConfig,
}

/// Creates a node pool running as its own `svc-<name>` service account.
///
/// Defaults are applied to `args` before anything is created, so a bad
/// defaults file fails the call without side effects.
///
/// # Errors
///
/// Returns [`ConfigError`] variants (wrapped) when defaults cannot be applied
/// or the disk size is not positive, and propagates provider failures
/// unchanged.
pub async fn new_gke_node_pool(
    ctx: &StackContext,
    name: &str,
    mut args: GkeNodePoolArgs,
    opts: &ComponentOptions,
) -> ComponentResult<GkeNodePoolState> {
    let report = ctx.defaulter().apply(&mut args)?;
    for applied in report.applied() {
        debug!(pool = name, path = applied.path(), source = %applied.source(), "default applied");
    }
    if args.node_config.disk_size_gb <= 0 {
        return Err(ConfigError::invalid_value(
            "nodeConfig.diskSizeGb",
            format!("must be positive, got {}", args.node_config.disk_size_gb),
        )
        .into());
    }

    let component = ctx.register_component(NODE_POOL_COMPONENT, name, opts).await?;
    let child = component.child_options(opts);

    let account = ctx
        .create(
            gcp::SERVICE_ACCOUNT,
            name,
            json!({
                "project": args.project_id,
                "accountId": format!("svc-{name}"),
                "displayName": name,
            }),
            &child,
        )
        .await?;
    let service_account = account.output_str("email")?.to_owned();

    ctx.create(
        gcp::NODE_POOL,
        name,
        json!({
            "project": args.project_id,
            "location": args.location,
            "cluster": args.cluster,
            "name": args.name,
            "nodeConfig": {
                "machineType": args.node_config.machine_type,
                "diskSizeGb": args.node_config.disk_size_gb,
                "diskType": args.node_config.disk_type,
                "serviceAccount": service_account,
                "oauthScopes": [CLOUD_PLATFORM_SCOPE],
            },
        }),
        &child,
    )
    .await?;

    info!(pool = name, cluster = %args.cluster, "node pool ready");
    Ok(GkeNodePoolState {
        urn: component.urn().clone(),
        service_account,
        node_config: args.node_config,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use infra_config::{Defaulter, DefaultsDocument, Precedence};
    use infra_provider::recording::RecordingProvider;
    use infra_provider::traits::ResourceProvider;

    use super::*;
    use crate::error::ComponentError;

    fn context(provider: &Arc<RecordingProvider>, defaulter: Defaulter) -> StackContext {
        StackContext::new(
            "dev",
            "infra",
            Arc::clone(provider) as Arc<dyn ResourceProvider>,
            defaulter,
        )
    }

    fn pool_args() -> GkeNodePoolArgs {
        GkeNodePoolArgs {
            project_id: "p1".into(),
            location: "europe-west1".into(),
            cluster: "gke-0".into(),
            ..GkeNodePoolArgs::default()
        }
    }

    #[tokio::test]
    async fn standard_cluster_drops_default_pool() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider, Defaulter::new(Precedence::AnnotationOnly));

        let args = GkeClusterArgs {
            project_id: "p1".into(),
            location: "europe-west1".into(),
            ..GkeClusterArgs::default()
        };
        let cluster = new_gke_cluster(&ctx, "gke-0", &args, &ComponentOptions::new())
            .await
            .unwrap();
        assert_eq!(cluster.name, "gke-0");
        assert_eq!(cluster.location, "europe-west1");

        let plan = provider.plan();
        let step = plan.created(gcp::CLUSTER).next().unwrap();
        assert_eq!(step.inputs["removeDefaultNodePool"], json!(true));
        assert_eq!(step.inputs["initialNodeCount"], json!(1));
        assert!(!step.inputs.contains_key("enableAutopilot"));
        assert_eq!(step.parent.as_ref(), Some(&cluster.urn));
    }

    #[tokio::test]
    async fn autopilot_cluster_keeps_node_management_to_gke() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider, Defaulter::new(Precedence::AnnotationOnly));

        let args = GkeClusterArgs {
            project_id: "p1".into(),
            location: "europe-west1".into(),
            autopilot: true,
            ..GkeClusterArgs::default()
        };
        new_gke_cluster(&ctx, "gke-0", &args, &ComponentOptions::new())
            .await
            .unwrap();

        let plan = provider.plan();
        let step = plan.created(gcp::CLUSTER).next().unwrap();
        assert_eq!(step.inputs["enableAutopilot"], json!(true));
        assert!(!step.inputs.contains_key("removeDefaultNodePool"));
    }

    #[tokio::test]
    async fn node_pool_fills_defaults_and_keeps_caller_disk_size() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider, Defaulter::new(Precedence::AnnotationOnly));

        let mut args = pool_args();
        args.node_config.disk_size_gb = 80;
        let pool = new_gke_node_pool(&ctx, "gke-np-0", args, &ComponentOptions::new())
            .await
            .unwrap();

        assert_eq!(pool.node_config.machine_type, "e2-standard");
        assert_eq!(pool.node_config.disk_type, "PD-STANDARD");
        assert_eq!(pool.node_config.disk_size_gb, 80);
        assert_eq!(pool.service_account, "svc-gke-np-0@p1.iam.gserviceaccount.com");

        let plan = provider.plan();
        assert!(
            plan.position(gcp::SERVICE_ACCOUNT, "gke-np-0") < plan.position(gcp::NODE_POOL, "gke-np-0")
        );
        let step = plan.created(gcp::NODE_POOL).next().unwrap();
        assert_eq!(step.inputs["nodeConfig"]["diskSizeGb"], json!(80));
        assert_eq!(step.inputs["nodeConfig"]["serviceAccount"], json!(pool.service_account));
        assert_eq!(step.inputs["nodeConfig"]["oauthScopes"], json!([CLOUD_PLATFORM_SCOPE]));
    }

    #[tokio::test]
    async fn node_pool_reads_defaults_document() {
        let provider = Arc::new(RecordingProvider::new());
        let document = DefaultsDocument::from_yaml_str(
            "inline",
            "nodeConfig:\n  machineType: n2-standard-4\n  diskSizeGb: 120\n",
        )
        .unwrap();
        let ctx = context(
            &provider,
            Defaulter::new(Precedence::DocumentFirst).with_document(document),
        );

        let pool = new_gke_node_pool(&ctx, "gke-np-0", pool_args(), &ComponentOptions::new())
            .await
            .unwrap();

        assert_eq!(pool.node_config.machine_type, "n2-standard-4");
        assert_eq!(pool.node_config.disk_size_gb, 120);
        assert_eq!(pool.node_config.disk_type, "PD-STANDARD");
    }

    #[tokio::test]
    async fn unusable_defaults_fail_before_any_resource() {
        let provider = Arc::new(RecordingProvider::new());
        let document =
            DefaultsDocument::from_yaml_str("inline", "nodeConfig:\n  diskSizeGb: large\n").unwrap();
        let ctx = context(
            &provider,
            Defaulter::new(Precedence::DocumentOnly).with_document(document),
        );

        let err = new_gke_node_pool(&ctx, "gke-np-0", pool_args(), &ComponentOptions::new())
            .await
            .expect_err("not an integer");
        assert!(matches!(
            err,
            ComponentError::Config(ConfigError::InvalidDefault { ref path, .. }) if path == "nodeConfig.diskSizeGb"
        ));
        assert!(provider.plan().is_empty());
    }

    #[tokio::test]
    async fn zero_disk_size_is_rejected() {
        let provider = Arc::new(RecordingProvider::new());
        let document =
            DefaultsDocument::from_yaml_str("inline", "nodeConfig:\n  machineType: e2-medium\n").unwrap();
        let ctx = context(
            &provider,
            Defaulter::new(Precedence::DocumentOnly).with_document(document),
        );

        let err = new_gke_node_pool(&ctx, "gke-np-0", pool_args(), &ComponentOptions::new())
            .await
            .expect_err("no disk size default");
        assert!(matches!(err, ComponentError::Config(ConfigError::InvalidValue { .. })));
        assert!(provider.plan().is_empty());
    }
}
