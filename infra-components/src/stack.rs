//! The stack program: every component of the demo environment, in dependency
//! order, driven by a [`Deployment`] lifecycle.

use infra_config::{ConfigError, StackConfig};
use infra_primitives::{ResourceName, RunId, Urn};
use infra_provider::gcp;
use infra_provider::traits::{ProviderError, ProviderRef};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{Instrument, error, info, info_span};

use crate::cloudnat::{CloudNatArgs, new_cloud_nat};
use crate::context::{ComponentOptions, StackContext};
use crate::error::ComponentResult;
use crate::gke::{
    GkeClusterArgs, GkeNetworkConfig, GkeNodePoolArgs, GkeNodePoolNodeConfig, new_gke_cluster,
    new_gke_node_pool,
};
use crate::lifecycle::{DeploymentEvent, DeploymentState, Lifecycle};
use crate::network::{NetworkArgs, NetworkState, SubnetworkArgs, new_network, new_subnetwork, subnet_cidr};
use crate::project::{
    FolderArgs, FolderState, OsLoginArgs, ProjectArgs, ProjectState, enable_services, new_folder,
    new_project,
};

/// Name of the explicit provider that acts as the billing user.
pub const BILLING_PROVIDER_NAME: &str = "googlebillinguser";
/// Name of the shared VPC.
pub const NETWORK_NAME: &str = "vpc";

const ACCESS_TOKEN_SCOPE: &str = "cloud-platform";

/// What one region of the stack produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    /// Region name.
    pub region: String,
    /// Subnetwork self link.
    pub subnetwork: String,
    /// Cluster name.
    pub cluster: String,
    /// Service account of the node pool.
    pub node_service_account: String,
    /// Cloud Router name.
    pub router: String,
}

/// What a successful deployment produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    /// Run that produced the summary.
    pub run_id: RunId,
    /// Folder holding the project.
    pub folder: FolderState,
    /// Project.
    pub project: ProjectState,
    /// Enabled API resources.
    pub services: Vec<Urn>,
    /// Shared VPC.
    pub network: NetworkState,
    /// Per-region resources, in configuration order.
    pub regions: Vec<RegionSummary>,
}

/// Creates the whole stack, one operation at a time.
///
/// The project is created through an explicit provider that impersonates the
/// billing service account; everything else uses the ambient provider. The
/// first error stops the run and resources already created are left in place.
///
/// The folder and project names are free-form display names; their logical
/// names are derived with [`ResourceName::from_display`] before anything is
/// issued.
///
/// # Errors
///
/// Propagates the first configuration or provider error.
pub async fn deploy(ctx: &StackContext, config: &StackConfig) -> ComponentResult<DeploymentSummary> {
    let folder_name = ResourceName::from_display(config.folder_name())?;
    let project_name = ResourceName::from_display(config.project_name())?;
    let ambient = ComponentOptions::new();

    let token = ctx
        .invoke(
            gcp::GET_ACCOUNT_ACCESS_TOKEN,
            json!({
                "targetServiceAccount": config.billing_service_account(),
                "scopes": [ACCESS_TOKEN_SCOPE],
            }),
        )
        .await?;
    let access_token = token
        .get("accessToken")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::response("access token result has no `accessToken`"))?;

    let billing_user = ctx
        .create(
            gcp::PROVIDER,
            BILLING_PROVIDER_NAME,
            json!({ "accessToken": access_token }),
            &ambient,
        )
        .await?;
    let as_billing_user = ComponentOptions::new().with_provider(ProviderRef::from_state(&billing_user));

    let folder = new_folder(
        ctx,
        folder_name.as_str(),
        &FolderArgs {
            organization_id: config.org_id().to_owned(),
            display_name: config.folder_name().to_owned(),
        },
        &ambient,
    )
    .await?;

    let project = new_project(
        ctx,
        project_name.as_str(),
        &ProjectArgs {
            project_id: config.project_id().to_owned(),
            name: Some(config.project_name().to_owned()),
            folder_id: Some(folder.name.clone()),
            billing_account: config.billing_account().to_owned(),
            auto_create_network: false,
            os_login: OsLoginArgs::default(),
        },
        &as_billing_user,
    )
    .await?;
    let project_id = project.project_id.clone();

    let services = enable_services(ctx, &project_id, config.services(), &ambient).await?;

    let network = new_network(
        ctx,
        NETWORK_NAME,
        &NetworkArgs {
            project_id: project_id.clone(),
        },
        &ambient,
    )
    .await?;

    let mut regions = Vec::with_capacity(config.regions().len());
    for (i, region) in config.regions().iter().enumerate() {
        let index = u8::try_from(i)
            .map_err(|_| ConfigError::invalid_value("regions", "at most 256 regions are supported"))?;
        info!(%region, index, "deploying region");

        let subnetwork = new_subnetwork(
            ctx,
            &format!("sn-{i}"),
            &SubnetworkArgs {
                project_id: project_id.clone(),
                network: network.self_link.clone(),
                region: region.clone(),
                ip_cidr_range: subnet_cidr(index),
            },
            &ambient,
        )
        .await?;

        let cluster = new_gke_cluster(
            ctx,
            &format!("gke-{i}"),
            &GkeClusterArgs {
                project_id: project_id.clone(),
                location: region.clone(),
                net_config: GkeNetworkConfig {
                    network: network.self_link.clone(),
                    subnetwork: subnetwork.self_link.clone(),
                },
                ..GkeClusterArgs::default()
            },
            &ambient,
        )
        .await?;

        let pool = new_gke_node_pool(
            ctx,
            &format!("gke-np-{i}"),
            GkeNodePoolArgs {
                project_id: project_id.clone(),
                location: cluster.location.clone(),
                cluster: cluster.name.clone(),
                name: None,
                node_config: GkeNodePoolNodeConfig {
                    disk_size_gb: config.node_disk_size_gb(),
                    ..GkeNodePoolNodeConfig::default()
                },
            },
            &ambient,
        )
        .await?;

        let nat = new_cloud_nat(
            ctx,
            &format!("cn-{i}-{region}"),
            &CloudNatArgs {
                project_id: project_id.clone(),
                region: region.clone(),
                vpc_network: network.self_link.clone(),
            },
            &ambient,
        )
        .await?;

        regions.push(RegionSummary {
            region: region.clone(),
            subnetwork: subnetwork.self_link,
            cluster: cluster.name,
            node_service_account: pool.service_account,
            router: nat.router,
        });
    }

    Ok(DeploymentSummary {
        run_id: ctx.run_id(),
        folder,
        project,
        services,
        network,
        regions,
    })
}

/// A single run of [`deploy`] tracked by a lifecycle.
#[derive(Debug)]
pub struct Deployment {
    ctx: StackContext,
    config: StackConfig,
    lifecycle: Lifecycle,
}

impl Deployment {
    /// Prepares a run; nothing is issued until [`Deployment::run`].
    #[must_use]
    pub fn new(ctx: StackContext, config: StackConfig) -> Self {
        let lifecycle = Lifecycle::new(ctx.run_id());
        Self {
            ctx,
            config,
            lifecycle,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DeploymentState {
        self.lifecycle.state()
    }

    /// Context the run issues operations through.
    #[must_use]
    pub fn context(&self) -> &StackContext {
        &self.ctx
    }

    /// Runs the stack program once.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`](crate::LifecycleError) (wrapped) if the run
    /// already happened, otherwise the first error raised by [`deploy`]. The
    /// lifecycle ends in [`DeploymentState::Failed`] in the latter case.
    pub async fn run(&mut self) -> ComponentResult<DeploymentSummary> {
        self.lifecycle.transition(DeploymentEvent::Start)?;

        let span = info_span!(
            "deployment",
            run_id = %self.ctx.run_id(),
            stack = self.ctx.stack(),
            project = self.config.project_id(),
        );
        let result = deploy(&self.ctx, &self.config).instrument(span).await;

        match result {
            Ok(summary) => {
                self.lifecycle.transition(DeploymentEvent::Succeed)?;
                info!(run_id = %self.ctx.run_id(), regions = summary.regions.len(), "deployment succeeded");
                Ok(summary)
            }
            Err(err) => {
                self.lifecycle.transition(DeploymentEvent::Fail)?;
                error!(run_id = %self.ctx.run_id(), error = %err, "deployment failed");
                Err(err)
            }
        }
    }
}
