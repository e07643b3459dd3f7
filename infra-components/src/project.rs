//! Organization folder, project, and API enablement.

use infra_primitives::Urn;
use infra_provider::gcp;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::context::{ComponentOptions, StackContext};
use crate::error::ComponentResult;

/// Component type token for projects.
pub const PROJECT_COMPONENT: &str = "pkg:google:project";

const OS_ADMIN_LOGIN_ROLE: &str = "roles/compute.osAdminLogin";
const OS_LOGIN_ROLE: &str = "roles/compute.osLogin";

/// Inputs for [`new_folder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderArgs {
    /// Numeric organization id; the folder's parent is `organizations/<id>`.
    pub organization_id: String,
    /// Human readable folder name.
    pub display_name: String,
}

/// Created folder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderState {
    /// Address of the folder resource.
    pub urn: Urn,
    /// Resource name in `folders/<id>` form, used as a project parent.
    pub name: String,
}

/// Creates a folder directly under the organization.
///
/// # Errors
///
/// Propagates provider failures unchanged.
pub async fn new_folder(
    ctx: &StackContext,
    name: &str,
    args: &FolderArgs,
    opts: &ComponentOptions,
) -> ComponentResult<FolderState> {
    let folder = ctx
        .create(
            gcp::FOLDER,
            name,
            json!({
                "displayName": args.display_name,
                "parent": format!("organizations/{}", args.organization_id),
            }),
            opts,
        )
        .await?;

    let state = FolderState {
        urn: folder.urn().clone(),
        name: folder.output_str("name")?.to_owned(),
    };
    info!(folder = %state.name, "folder ready");
    Ok(state)
}

/// OS Login settings for a project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OsLoginArgs {
    /// Sets the `enable-oslogin` project metadata.
    pub enabled: bool,
    /// Members granted administrator login.
    pub admins: Vec<String>,
    /// Members granted regular login.
    pub users: Vec<String>,
}

/// Inputs for [`new_project`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectArgs {
    /// Globally unique project id.
    pub project_id: String,
    /// Display name; the provider picks one when absent.
    pub name: Option<String>,
    /// Parent folder in `folders/<id>` form.
    pub folder_id: Option<String>,
    /// Billing account to link.
    pub billing_account: String,
    /// Whether the `default` network is created.
    pub auto_create_network: bool,
    /// OS Login configuration.
    pub os_login: OsLoginArgs,
}

/// Created project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    /// Address of the component.
    pub urn: Urn,
    /// Project id downstream resources are created in.
    pub project_id: String,
    /// Project number.
    pub number: String,
}

/// Creates a billing-linked project.
///
/// # Errors
///
/// Propagates provider failures unchanged.
pub async fn new_project(
    ctx: &StackContext,
    name: &str,
    args: &ProjectArgs,
    opts: &ComponentOptions,
) -> ComponentResult<ProjectState> {
    let component = ctx.register_component(PROJECT_COMPONENT, name, opts).await?;
    let child = component.child_options(opts);

    let project = ctx
        .create(
            gcp::PROJECT,
            name,
            json!({
                "projectId": args.project_id,
                "name": args.name,
                "folderId": args.folder_id,
                "billingAccount": args.billing_account,
                "autoCreateNetwork": args.auto_create_network,
            }),
            &child,
        )
        .await?;
    let project_id = project.output_str("projectId")?.to_owned();

    if args.os_login.enabled {
        ctx.create(
            gcp::PROJECT_METADATA_ITEM,
            &format!("{name}-oslogin"),
            json!({
                "project": project_id,
                "key": "enable-oslogin",
                "value": "TRUE",
            }),
            &child,
        )
        .await?;

        let grants = args
            .os_login
            .admins
            .iter()
            .map(|member| (OS_ADMIN_LOGIN_ROLE, member, "admin"))
            .chain(args.os_login.users.iter().map(|member| (OS_LOGIN_ROLE, member, "user")));
        for (i, (role, member, kind)) in grants.enumerate() {
            debug!(%member, role, "granting os login");
            ctx.create(
                gcp::IAM_MEMBER,
                &format!("{name}-oslogin-{kind}-{i}"),
                json!({ "project": project_id, "role": role, "member": member }),
                &child,
            )
            .await?;
        }
    }

    info!(project = %project_id, "project ready");
    Ok(ProjectState {
        urn: component.urn().clone(),
        project_id,
        number: project.output_str("number")?.to_owned(),
    })
}

/// Enables each API on the project, one `api-<i>` resource per service.
///
/// # Errors
///
/// Stops at the first provider failure.
pub async fn enable_services(
    ctx: &StackContext,
    project_id: &str,
    services: &[String],
    opts: &ComponentOptions,
) -> ComponentResult<Vec<Urn>> {
    let mut enabled = Vec::with_capacity(services.len());
    for (i, service) in services.iter().enumerate() {
        let state = ctx
            .create(
                gcp::SERVICE,
                &format!("api-{i}"),
                json!({
                    "project": project_id,
                    "service": service,
                    "disableDependentServices": false,
                }),
                opts,
            )
            .await?;
        debug!(%service, "service enabled");
        enabled.push(state.urn().clone());
    }
    Ok(enabled)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use infra_config::{Defaulter, Precedence};
    use infra_provider::recording::RecordingProvider;
    use infra_provider::traits::ResourceProvider;

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
    async fn folder_parent_is_organization() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider);

        let folder = new_folder(
            &ctx,
            "mcg",
            &FolderArgs {
                organization_id: "1234".into(),
                display_name: "mcg".into(),
            },
            &ComponentOptions::new(),
        )
        .await
        .unwrap();

        assert_eq!(folder.name, "folders/1");
        let plan = provider.plan();
        let step = plan.created(gcp::FOLDER).next().unwrap();
        assert_eq!(step.inputs["parent"], json!("organizations/1234"));
    }

    #[tokio::test]
    async fn os_login_adds_metadata_and_members() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider);

        let args = ProjectArgs {
            project_id: "demo-1".into(),
            billing_account: "000000-000000-000000".into(),
            os_login: OsLoginArgs {
                enabled: true,
                admins: vec!["group:ops@example.com".into()],
                users: vec!["user:a@example.com".into(), "user:b@example.com".into()],
            },
            ..ProjectArgs::default()
        };
        let project = new_project(&ctx, "demo", &args, &ComponentOptions::new())
            .await
            .unwrap();
        assert_eq!(project.project_id, "demo-1");

        let plan = provider.plan();
        let project_step = plan.created(gcp::PROJECT).next().unwrap();
        assert!(!project_step.inputs.contains_key("name"));
        assert_eq!(project_step.parent.as_ref(), Some(&project.urn));

        let metadata = plan.created(gcp::PROJECT_METADATA_ITEM).next().unwrap();
        assert_eq!(metadata.inputs["key"], json!("enable-oslogin"));

        let roles: Vec<_> = plan
            .created(gcp::IAM_MEMBER)
            .map(|step| step.inputs["role"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(roles, [OS_ADMIN_LOGIN_ROLE, OS_LOGIN_ROLE, OS_LOGIN_ROLE]);
    }

    #[tokio::test]
    async fn os_login_disabled_creates_only_the_project() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider);

        let args = ProjectArgs {
            project_id: "demo-1".into(),
            billing_account: "b".into(),
            os_login: OsLoginArgs {
                enabled: false,
                admins: vec!["group:ops@example.com".into()],
                users: Vec::new(),
            },
            ..ProjectArgs::default()
        };
        new_project(&ctx, "demo", &args, &ComponentOptions::new())
            .await
            .unwrap();

        let plan = provider.plan();
        assert_eq!(plan.created(gcp::IAM_MEMBER).count(), 0);
        assert_eq!(plan.created(gcp::PROJECT_METADATA_ITEM).count(), 0);
    }

    #[tokio::test]
    async fn services_are_numbered() {
        let provider = Arc::new(RecordingProvider::new());
        let ctx = context(&provider);

        let services = vec!["container.googleapis.com".to_owned(), "dns.googleapis.com".to_owned()];
        let urns = enable_services(&ctx, "demo-1", &services, &ComponentOptions::new())
            .await
            .unwrap();

        assert_eq!(urns.len(), 2);
        assert_eq!(urns[1].name().as_str(), "api-1");
        let plan = provider.plan();
        let first = plan.created(gcp::SERVICE).next().unwrap();
        assert_eq!(first.inputs["service"], json!("container.googleapis.com"));
        assert_eq!(first.inputs["disableDependentServices"], json!(false));
    }
}
