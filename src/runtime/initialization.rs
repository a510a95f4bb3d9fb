//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, HTTP server, and
//! Kubernetes client/reconciler construction. Modeled on the teacher's
//! `runtime/initialization.rs`, with OTel, PACT_MODE, SOPS key watch, and
//! hot-reload ConfigMap watch dropped — none have a Reloader counterpart.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{info, warn};

use crate::config::ControllerConfig;
use crate::controller::Reconciler;
use crate::crd::ReloaderConfig;
use crate::server::{start_server, ServerState};
use crate::{observability, status_queue};

/// Everything [`crate::main`] needs to hand off to the watch loops.
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
}

/// Installs the rustls crypto provider, sets up tracing, starts the
/// metrics/health server, builds a client, and reconciles every existing
/// `ReloaderConfig`/Secret/ConfigMap before the watch loops take over.
pub async fn initialize() -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("failed to install rustls crypto provider"));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reloader_controller=info".into()),
        )
        .init();

    info!("starting reloader-controller");

    observability::metrics::register_metrics().context("failed to register metrics")?;

    let config = Arc::new(ControllerConfig::from_env());

    let server_state = Arc::new(ServerState { is_ready: Arc::new(AtomicBool::new(false)) });
    let server_port = config.metrics_port;
    let server_state_clone = server_state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(error) = start_server(server_port, server_state_clone).await {
            tracing::error!(%error, "HTTP server error");
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default().await.context("failed to build Kubernetes client")?;

    let (status_queue, _status_queue_task) = status_queue::spawn(client.clone());
    let reconciler = Arc::new(Reconciler::new(client.clone(), config, status_queue));

    reconcile_existing_reloader_configs(&client, &reconciler).await?;
    reconciler.mark_initialized();

    info!("controller initialized, starting watch loops");

    Ok(InitializationResult { client, reconciler })
}

async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(crate::constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = std::time::Duration::from_millis(crate::constants::DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Lists every `ReloaderConfig` across the cluster and validates each one,
/// so configs created before the controller started still get a status
/// (spec §9 "Startup suppression" only gates create/delete event
/// processing for Secrets/ConfigMaps, not this sweep).
async fn reconcile_existing_reloader_configs(client: &Client, reconciler: &Arc<Reconciler>) -> Result<()> {
    let configs: Api<ReloaderConfig> = Api::all(client.clone());
    let list = configs.list(&ListParams::default()).await.context("listing existing ReloaderConfigs")?;

    info!(count = list.items.len(), "found existing ReloaderConfig resources");

    for item in &list.items {
        let namespace = item.namespace().unwrap_or_default();
        let name = item.name_any();
        if let Err(error) = crate::controller::reconcile_reloader_config(reconciler, item).await {
            warn!(namespace, name, %error, "failed to reconcile existing ReloaderConfig at startup");
        }
    }

    Ok(())
}
