//! # Reloader Controller
//!
//! A Kubernetes controller that triggers rolling restarts of Deployments,
//! StatefulSets, and DaemonSets when the Secrets or ConfigMaps they consume
//! change.
//!
//! ## Overview
//!
//! The controller watches Secrets and ConfigMaps cluster-wide plus the
//! `ReloaderConfig` custom resource. On a content change it finds every
//! `ReloaderConfig` watching that resource (or any workload opted in via
//! annotations), resolves the effective rollout/reload strategy for each
//! target, and either mutates the pod template (to provoke a rolling
//! update) or deletes pods directly, subject to pause periods and
//! reference checks.
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for detailed usage instructions.

use anyhow::Result;
use clap::Parser;
use kube::core::CustomResourceExt;

use reloader_controller::crd::ReloaderConfig;
use reloader_controller::runtime;

/// Kubernetes controller that triggers rolling restarts on Secret/ConfigMap changes.
#[derive(Parser, Debug)]
#[command(name = "reloader-controller", version, about)]
struct Cli {
    /// Print the ReloaderConfig CustomResourceDefinition as YAML and exit,
    /// instead of running the controller.
    #[arg(long)]
    print_crd: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_crd {
        let crd = ReloaderConfig::crd();
        println!("{}", serde_yaml::to_string(&crd)?);
        return Ok(());
    }

    let runtime::InitializationResult { client, reconciler } = runtime::initialize().await?;

    tokio::join!(
        runtime::run_secret_watch(client.clone(), reconciler.clone()),
        runtime::run_configmap_watch(client.clone(), reconciler.clone()),
        runtime::run_reloader_config_watch(client, reconciler),
    );

    Ok(())
}
