//! hco - composite operator for the Cluster CRD

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{predicates, reflector, watcher, Controller, WatchStreamExt};
use kube::{Api, Client, CustomResourceExt};

use hco::config::OperatorConfig;
use hco::controller::{error_policy, reconcile, Context};
use hco::crd::{App, Cluster, SidecarA, SidecarB};
use hco::telemetry::init_tracing;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// hco - keeps an App and its sidecars in sync with a Cluster resource
#[derive(Parser, Debug)]
#[command(name = "hco", version, about, long_about = None)]
struct Cli {
    /// Print the CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    config: OperatorConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches Cluster resources and the App, SidecarA and SidecarB
    /// children they own.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        for crd in all_crds() {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    init_tracing(cli.config.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.config).await,
    }
}

fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![Cluster::crd(), App::crd(), SidecarA::crd(), SidecarB::crd()]
}

/// Ensure all hco CRDs are installed
///
/// The operator installs its own CRDs on startup using server-side apply.
/// This ensures the CRD versions always match the operator version.
async fn ensure_crds_installed(client: &Client, field_manager: &str) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(field_manager).force();

    for crd in all_crds() {
        let name = crd
            .metadata
            .name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generated CRD has no name"))?;
        tracing::info!(crd = %name, "Installing CRD");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("All hco CRDs installed/updated");
    Ok(())
}

/// Run the Cluster controller until a shutdown signal arrives
async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(
        strategy = ?config.strategy,
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        "Starting hco controller"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client, &config.field_manager).await?;

    let ctx = Arc::new(
        Context::builder(client.clone())
            .config(config.reconcile_config())
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid operand composition: {}", e))?,
    );

    let (clusters, apps, sidecar_as, sidecar_bs) = match config.namespace.as_deref() {
        Some(ns) => (
            Api::<Cluster>::namespaced(client.clone(), ns),
            Api::<App>::namespaced(client.clone(), ns),
            Api::<SidecarA>::namespaced(client.clone(), ns),
            Api::<SidecarB>::namespaced(client.clone(), ns),
        ),
        None => (
            Api::<Cluster>::all(client.clone()),
            Api::<App>::all(client.clone()),
            Api::<SidecarA>::all(client.clone()),
            Api::<SidecarB>::all(client.clone()),
        ),
    };

    let watcher_config = || WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS);

    // Status-only updates to a Cluster do not bump its generation, so the
    // controller's own status writes never re-trigger it.
    let (reader, writer) = reflector::store();
    let cluster_stream = watcher(clusters, watcher_config())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicates::generation);

    tracing::info!("- Cluster controller");

    Controller::for_stream(cluster_stream, reader)
        .owns(apps, watcher_config())
        .owns(sidecar_as, watcher_config())
        .owns(sidecar_bs, watcher_config())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("Cluster"))
        .await;

    tracing::info!("Controller stopped");
    Ok(())
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
