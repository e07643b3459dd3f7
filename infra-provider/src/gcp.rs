//! Type tokens of the Google Cloud resources and functions used by the stack.

/// Explicit provider configuration resource.
pub const PROVIDER: &str = "pulumi:providers:gcp";
/// Organization folder.
pub const FOLDER: &str = "gcp:organizations/folder:Folder";
/// Project.
pub const PROJECT: &str = "gcp:organizations/project:Project";
/// Enabled API on a project.
pub const SERVICE: &str = "gcp:projects/service:Service";
/// Project-level IAM member binding.
pub const IAM_MEMBER: &str = "gcp:projects/iAMMember:IAMMember";
/// Project metadata entry.
pub const PROJECT_METADATA_ITEM: &str = "gcp:compute/projectMetadataItem:ProjectMetadataItem";
/// VPC network.
pub const NETWORK: &str = "gcp:compute/network:Network";
/// Regional subnetwork.
pub const SUBNETWORK: &str = "gcp:compute/subnetwork:Subnetwork";
/// Cloud Router.
pub const ROUTER: &str = "gcp:compute/router:Router";
/// Cloud NAT attached to a router.
pub const ROUTER_NAT: &str = "gcp:compute/routerNat:RouterNat";
/// Service account.
pub const SERVICE_ACCOUNT: &str = "gcp:serviceaccount/account:Account";
/// GKE cluster.
pub const CLUSTER: &str = "gcp:container/cluster:Cluster";
/// GKE node pool.
pub const NODE_POOL: &str = "gcp:container/nodePool:NodePool";
/// Function returning a short-lived access token for a service account.
pub const GET_ACCOUNT_ACCESS_TOKEN: &str =
    "gcp:serviceaccount/getAccountAccessToken:getAccountAccessToken";
