//! Previews the mcg-demo stack: reads the stack file, applies overrides, runs
//! the deployment against the recording provider, and prints the plan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use infra_components::{Deployment, DeploymentSummary, StackContext};
use infra_config::{ConfigValues, Defaulter, Precedence, StackConfig};
use infra_provider::recording::{Plan, RecordingProvider};
use infra_provider::traits::ResourceProvider;
use infra_telemetry::{LogFormat, TelemetryConfig};
use serde::Serialize;
use tracing::info;

const BUNDLED_DEFAULTS: &str = "modules/gke-cluster/defaults.yaml";

#[derive(Debug, Parser)]
#[command(name = "mcg-demo", version, about = "Preview the mcg-demo GCP stack")]
struct Cli {
    /// Stack settings file with a `config:` mapping.
    #[arg(long, default_value = "Pulumi.dev.yaml")]
    stack_file: PathBuf,

    /// Stack name; derived from `Pulumi.<stack>.yaml` when omitted.
    #[arg(long)]
    stack: Option<String>,

    /// Project name used in resource addresses.
    #[arg(long, default_value = "infra")]
    project: String,

    /// Prefix stripped from stack file keys.
    #[arg(long, default_value = "mcg-demo")]
    namespace: String,

    /// Node pool defaults file; the bundled one is used when omitted.
    #[arg(long)]
    defaults: Option<PathBuf>,

    /// Order in which defaults sources are consulted.
    #[arg(long, default_value = "document-first")]
    precedence: Precedence,

    /// Overrides a stack value, e.g. `--set regions=europe-west1,us-east1`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Log filter directives; `RUST_LOG` is used when omitted.
    #[arg(long)]
    log_filter: Option<String>,

    /// Log line layout.
    #[arg(long, default_value = "full")]
    log_format: LogFormat,
}

#[derive(Serialize)]
struct Preview<'a> {
    stack: &'a str,
    summary: DeploymentSummary,
    plan: &'a Plan,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::default().with_format(cli.log_format);
    telemetry.filter.clone_from(&cli.log_filter);
    infra_telemetry::init(&telemetry)?;

    let mut values = ConfigValues::from_stack_file(&cli.stack_file, &cli.namespace)
        .with_context(|| format!("loading stack file {}", cli.stack_file.display()))?;
    for assignment in &cli.overrides {
        values.apply_override(assignment)?;
    }
    let config = StackConfig::from_values(&values).context("validating stack configuration")?;

    let defaults = cli.defaults.clone().unwrap_or_else(bundled_defaults);
    let stack = cli.stack.clone().unwrap_or_else(|| stack_name(&cli.stack_file));
    info!(
        %stack,
        project_id = config.project_id(),
        defaults = %defaults.display(),
        precedence = %cli.precedence,
        "previewing stack"
    );

    let provider = Arc::new(RecordingProvider::new());
    let defaulter = Defaulter::new(cli.precedence).with_defaults_file(defaults);
    let ctx = StackContext::new(
        stack.clone(),
        cli.project,
        Arc::clone(&provider) as Arc<dyn ResourceProvider>,
        defaulter,
    );

    let mut deployment = Deployment::new(ctx, config);
    let summary = deployment.run().await.context("deployment failed")?;

    let plan = provider.plan();
    let preview = Preview {
        stack: &stack,
        summary,
        plan: &plan,
    };
    println!("{}", serde_json::to_string_pretty(&preview)?);
    info!(steps = plan.len(), state = ?deployment.state(), "preview complete");

    Ok(())
}

fn bundled_defaults() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(BUNDLED_DEFAULTS)
}

/// `Pulumi.dev.yaml` -> `dev`; anything else falls back to `dev`.
fn stack_name(stack_file: &Path) -> String {
    stack_file
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("Pulumi."))
        .and_then(|rest| rest.strip_suffix(".yaml").or_else(|| rest.strip_suffix(".yml")))
        .filter(|stack| !stack.is_empty())
        .unwrap_or("dev")
        .to_owned()
}
