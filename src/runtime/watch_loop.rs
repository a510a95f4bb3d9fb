//! # Watch Loops
//!
//! Turns the three raw `watcher()` streams (Secret, ConfigMap,
//! ReloaderConfig) into calls against the Reconciler Core. Each loop is its
//! own `tokio::spawn`ed task, restarted on error, modeled on the teacher's
//! `config/watch.rs` ConfigMap hot-reload watch.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client, ResourceExt};
use kube_runtime::watcher;
use tracing::{info, warn};

use crate::controller::{
    self, reconcile_configmap_applied, reconcile_configmap_deleted, reconcile_reloader_config,
    reconcile_secret_applied, reconcile_secret_deleted, Reconciler,
};
use crate::crd::ReloaderConfig;
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_watch_stream_error, WatchErrorAction};

/// Watches all Secrets cluster-wide and routes Apply/Delete events to the
/// Reconciler Core. Runs until the process exits, restarting the
/// underlying stream on any error.
pub async fn run_secret_watch(client: Client, reconciler: Arc<Reconciler>) {
    run_watch_loop("Secret", Api::<Secret>::all(client), &reconciler, |reconciler, event| {
        Box::pin(async move {
            match event {
                watcher::Event::Apply(secret) => reconcile_secret_applied(reconciler, &secret).await,
                watcher::Event::Delete(secret) => {
                    let namespace = secret.namespace().unwrap_or_default();
                    reconcile_secret_deleted(reconciler, &namespace, &secret.name_any()).await
                }
                watcher::Event::Init | watcher::Event::InitApply(_) => Ok(()),
                watcher::Event::InitDone => {
                    reconciler.mark_initialized();
                    Ok(())
                }
            }
        })
    })
    .await;
}

/// Watches all ConfigMaps cluster-wide, mirroring [`run_secret_watch`].
pub async fn run_configmap_watch(client: Client, reconciler: Arc<Reconciler>) {
    run_watch_loop("ConfigMap", Api::<ConfigMap>::all(client), &reconciler, |reconciler, event| {
        Box::pin(async move {
            match event {
                watcher::Event::Apply(config_map) => reconcile_configmap_applied(reconciler, &config_map).await,
                watcher::Event::Delete(config_map) => {
                    let namespace = config_map.namespace().unwrap_or_default();
                    reconcile_configmap_deleted(reconciler, &namespace, &config_map.name_any()).await
                }
                watcher::Event::Init | watcher::Event::InitApply(_) => Ok(()),
                watcher::Event::InitDone => Ok(()),
            }
        })
    })
    .await;
}

/// Watches all `ReloaderConfig` resources cluster-wide and validates each on
/// apply (spec §7 status/Conditions). Deletes need no handling: a removed
/// config simply stops matching in `findConfigsWatchingResource` on the
/// next Secret/ConfigMap event.
pub async fn run_reloader_config_watch(client: Client, reconciler: Arc<Reconciler>) {
    run_watch_loop(
        "ReloaderConfig",
        Api::<ReloaderConfig>::all(client),
        &reconciler,
        |reconciler, event| {
            Box::pin(async move {
                match event {
                    watcher::Event::Apply(config) => reconcile_reloader_config(reconciler, &config).await,
                    watcher::Event::Delete(_) => Ok(()),
                    watcher::Event::Init | watcher::Event::InitApply(_) | watcher::Event::InitDone => Ok(()),
                }
            })
        },
    )
    .await;
}

type ReconcileFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), controller::ReconcilerError>> + Send + 'a>>;

/// Drives a single typed `watcher()` stream, dispatching every event through
/// `handle` and restarting the stream (via the outer `loop`) whenever it
/// yields an error or ends.
async fn run_watch_loop<K, F>(kind: &'static str, api: Api<K>, reconciler: &Arc<Reconciler>, handle: F)
where
    K: kube::Resource<DynamicType = ()> + Clone + std::fmt::Debug + serde::de::DeserializeOwned + Send + Sync + 'static,
    F: for<'a> Fn(&'a Reconciler, watcher::Event<K>) -> ReconcileFuture<'a> + Copy,
{
    let backoff_ms = Arc::new(AtomicU64::new(reconciler.config.backoff_start_ms));
    let max_backoff_ms = reconciler.config.backoff_max_ms;
    let watch_restart_delay_secs = reconciler.config.watch_restart_delay_secs;

    loop {
        info!(kind, "starting watch");
        let stream = watcher(api.clone(), watcher::Config::default());
        pin_mut!(stream);

        while let Some(event_result) = stream.next().await {
            match event_result {
                Ok(event) => {
                    let started = std::time::Instant::now();
                    let result = handle(reconciler, event).await;
                    metrics::increment_reconciliations();
                    metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());
                    if let Err(error) = result {
                        metrics::increment_reconciliation_errors();
                        warn!(kind, error = %error, "reconcile error, continuing watch");
                    }
                }
                Err(error) => {
                    match handle_watch_stream_error(&error, &backoff_ms, max_backoff_ms, watch_restart_delay_secs).await {
                        WatchErrorAction::Restart => break,
                    }
                }
            }
        }

        warn!(kind, "watch stream ended, restarting");
        tokio::time::sleep(reconciler.config.watch_restart_delay_after_end_duration()).await;
    }
}
