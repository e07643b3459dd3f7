//! Cloud NAT for outbound traffic from private nodes.

use infra_primitives::Urn;
use infra_provider::gcp;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::context::{ComponentOptions, StackContext};
use crate::error::ComponentResult;

/// Component type token for Cloud NAT.
pub const CLOUD_NAT_COMPONENT: &str = "pkg:google:NetCloudNat";

const ROUTER_ASN: u32 = 64514;

/// Inputs for [`new_cloud_nat`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudNatArgs {
    /// Project the router lives in.
    pub project_id: String,
    /// Region served by the NAT.
    pub region: String,
    /// Self link of the VPC.
    pub vpc_network: String,
}

/// Created router and NAT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudNatState {
    /// Address of the component.
    pub urn: Urn,
    /// Router name.
    pub router: String,
}

/// Creates a router and a NAT covering every subnetwork range in the region,
/// with automatically allocated addresses and error logging.
///
/// # Errors
///
/// Propagates provider failures unchanged.
pub async fn new_cloud_nat(
    ctx: &StackContext,
    name: &str,
    args: &CloudNatArgs,
    opts: &ComponentOptions,
) -> ComponentResult<CloudNatState> {
    let component = ctx.register_component(CLOUD_NAT_COMPONENT, name, opts).await?;
    let child = component.child_options(opts);

    let router = ctx
        .create(
            gcp::ROUTER,
            name,
            json!({
                "project": args.project_id,
                "region": args.region,
                "network": args.vpc_network,
                "bgp": { "asn": ROUTER_ASN },
            }),
            &child,
        )
        .await?;
    let router_name = router.output_str("name")?.to_owned();

    ctx.create(
        gcp::ROUTER_NAT,
        name,
        json!({
            "project": args.project_id,
            "region": args.region,
            "router": router_name,
            "natIpAllocateOption": "AUTO_ONLY",
            "sourceSubnetworkIpRangesToNat": "ALL_SUBNETWORKS_ALL_IP_RANGES",
            "logConfig": { "enable": true, "filter": "ERRORS_ONLY" },
        }),
        &child,
    )
    .await?;

    info!(nat = name, region = %args.region, "cloud nat ready");
    Ok(CloudNatState {
        urn: component.urn().clone(),
        router: router_name,
    })
}
