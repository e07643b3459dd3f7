//! VPC network and regional subnetworks.

use infra_primitives::Urn;
use infra_provider::gcp;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::context::{ComponentOptions, StackContext};
use crate::error::ComponentResult;

/// Inputs for [`new_network`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkArgs {
    /// Project the network lives in.
    pub project_id: String,
}

/// Created network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    /// Address of the network resource.
    pub urn: Urn,
    /// Self link referenced by subnetworks, clusters, and routers.
    pub self_link: String,
}

/// Creates a custom-mode VPC with global routing.
///
/// # Errors
///
/// Propagates provider failures unchanged.
pub async fn new_network(
    ctx: &StackContext,
    name: &str,
    args: &NetworkArgs,
    opts: &ComponentOptions,
) -> ComponentResult<NetworkState> {
    let network = ctx
        .create(
            gcp::NETWORK,
            name,
            json!({
                "project": args.project_id,
                "autoCreateSubnetworks": false,
                "routingMode": "GLOBAL",
            }),
            opts,
        )
        .await?;

    let self_link = network.output_str("selfLink")?.to_owned();
    info!(network = name, %self_link, "network ready");
    Ok(NetworkState {
        urn: network.urn().clone(),
        self_link,
    })
}

/// Inputs for [`new_subnetwork`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubnetworkArgs {
    /// Project the subnetwork lives in.
    pub project_id: String,
    /// Self link of the parent network.
    pub network: String,
    /// Region, e.g. `europe-west1`.
    pub region: String,
    /// Primary IPv4 range.
    pub ip_cidr_range: String,
}

/// Created subnetwork.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetworkState {
    /// Address of the subnetwork resource.
    pub urn: Urn,
    /// Self link referenced by clusters.
    pub self_link: String,
}

/// Creates a subnetwork with Private Google Access.
///
/// # Errors
///
/// Propagates provider failures unchanged.
pub async fn new_subnetwork(
    ctx: &StackContext,
    name: &str,
    args: &SubnetworkArgs,
    opts: &ComponentOptions,
) -> ComponentResult<SubnetworkState> {
    let subnetwork = ctx
        .create(
            gcp::SUBNETWORK,
            name,
            json!({
                "project": args.project_id,
                "network": args.network,
                "region": args.region,
                "ipCidrRange": args.ip_cidr_range,
                "privateIpGoogleAccess": true,
            }),
            opts,
        )
        .await?;

    Ok(SubnetworkState {
        urn: subnetwork.urn().clone(),
        self_link: subnetwork.output_str("selfLink")?.to_owned(),
    })
}

/// The `/16` range assigned to the subnetwork at `index`.
#[must_use]
pub fn subnet_cidr(index: u8) -> String {
    format!("10.{index}.0.0/16")
}
