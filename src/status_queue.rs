//! # Status Queue
//!
//! A single-worker, rate-limited queue guaranteeing at-most-one in-flight
//! status write per `ReloaderConfig` and bounded retry on conflict (spec
//! §4.7). Enqueuers never block on the write itself; they hand an item to
//! the worker and move on.

use std::collections::BTreeMap;
use std::time::Duration;

use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::constants::{FIELD_MANAGER, STATUS_QUEUE_BACKOFF_BASE_MS, STATUS_QUEUE_MAX_ATTEMPTS};
use crate::crd::{
    Condition, ReloaderConfig, CONDITION_AVAILABLE, CONDITION_DEGRADED, REASON_RELOAD_FAILED,
    REASON_RELOAD_SUCCEEDED,
};
use crate::observability::metrics;

/// A delta to apply to one `ReloaderConfig`'s status on next write.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// Record (or, if `hash` is empty, remove) the stored hash for a watched
    /// resource key and bump the config-level reload counter/timestamp.
    ConfigLevel {
        resource_key: String,
        hash: String,
        reload_count_delta: i64,
    },
    /// Record the outcome of a single target's reload attempt.
    TargetLevel {
        target_key: String,
        success: bool,
        error: String,
        paused_until: Option<String>,
    },
    /// Upsert a top-level condition (spec §7), e.g. `Progressing` while a
    /// reload is in flight.
    ConditionLevel { condition: Condition },
}

#[derive(Debug, Clone)]
struct QueueItem {
    namespace: String,
    name: String,
    update: StatusUpdate,
    attempt: u32,
}

/// Handle enqueuers hold; cloning it is cheap, cloning the worker is not
/// possible (there is exactly one).
#[derive(Clone)]
pub struct StatusQueueHandle {
    sender: mpsc::UnboundedSender<QueueItem>,
}

impl StatusQueueHandle {
    pub fn enqueue(&self, namespace: impl Into<String>, name: impl Into<String>, update: StatusUpdate) {
        let item = QueueItem {
            namespace: namespace.into(),
            name: name.into(),
            update,
            attempt: 0,
        };
        // The receiver only disappears once the worker task is gone, which
        // only happens at process shutdown; at that point there's nothing
        // useful to do with a dropped status write.
        let _ = self.sender.send(item);
    }
}

/// Spawn the worker task and return a handle plus its join handle (the
/// caller awaits the join handle during shutdown to drain the queue).
pub fn spawn(client: Client) -> (StatusQueueHandle, tokio::task::JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_worker(client, receiver));
    (StatusQueueHandle { sender }, join)
}

async fn run_worker(client: Client, mut receiver: mpsc::UnboundedReceiver<QueueItem>) {
    while let Some(item) = receiver.recv().await {
        process_item(&client, item, &receiver).await;
    }
    debug!("status queue worker exiting, channel closed");
}

/// Process one item, retrying with backoff inline before accepting the next
/// one — this is what makes the queue single-worker and serialized.
async fn process_item(client: &Client, mut item: QueueItem, receiver: &mpsc::UnboundedReceiver<QueueItem>) {
    let _ = receiver;
    loop {
        match apply_update(client, &item).await {
            Ok(()) => return,
            Err(ApplyError::NotFound) => {
                debug!(
                    namespace = %item.namespace,
                    name = %item.name,
                    "ReloaderConfig no longer exists, dropping status update"
                );
                return;
            }
            Err(ApplyError::Transient(source)) => {
                item.attempt += 1;
                if item.attempt >= STATUS_QUEUE_MAX_ATTEMPTS {
                    metrics::increment_status_queue_drops();
                    error!(
                        namespace = %item.namespace,
                        name = %item.name,
                        attempt = item.attempt,
                        %source,
                        "status update exhausted retries, dropping"
                    );
                    return;
                }
                metrics::increment_status_queue_retries();
                let backoff = STATUS_QUEUE_BACKOFF_BASE_MS * 2u64.pow(item.attempt - 1);
                warn!(
                    namespace = %item.namespace,
                    name = %item.name,
                    attempt = item.attempt,
                    backoff_ms = backoff,
                    %source,
                    "status update failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
    }
}

enum ApplyError {
    NotFound,
    Transient(kube::Error),
}

/// Refetch the live object, apply the delta, and PATCH the status
/// subresource — optimistic concurrency against the API server is the only
/// correctness guard (spec §9).
async fn apply_update(client: &Client, item: &QueueItem) -> Result<(), ApplyError> {
    let api: Api<ReloaderConfig> = Api::namespaced(client.clone(), &item.namespace);
    let config = match api.get(&item.name).await {
        Ok(config) => config,
        Err(kube::Error::Api(e)) if e.code == 404 => return Err(ApplyError::NotFound),
        Err(source) => return Err(ApplyError::Transient(source)),
    };

    let mut status = config.status.clone().unwrap_or_default();
    apply_delta(&mut status, &item.update);

    let patch = serde_json::json!({ "status": status });
    match api
        .patch_status(&item.name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(patch))
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Err(ApplyError::NotFound),
        Err(source) => Err(ApplyError::Transient(source)),
    }
}

fn apply_delta(status: &mut crate::crd::ReloaderConfigStatus, update: &StatusUpdate) {
    match update {
        StatusUpdate::ConfigLevel {
            resource_key,
            hash,
            reload_count_delta,
        } => {
            if hash.is_empty() {
                status.watched_hashes.remove(resource_key);
            } else {
                status.watched_hashes.insert(resource_key.clone(), hash.clone());
            }
            status.reload_count += reload_count_delta;
            if *reload_count_delta != 0 {
                status.last_reload_time = Some(chrono::Utc::now().to_rfc3339());
            }
        }
        StatusUpdate::TargetLevel {
            target_key,
            success,
            error,
            paused_until,
        } => {
            let entry = status.targets.entry(target_key.clone()).or_default();
            if *success {
                entry.reload_count += 1;
                entry.last_error = String::new();
                entry.paused_until = paused_until.clone();
                status.set_condition(Condition::new(CONDITION_AVAILABLE, true, REASON_RELOAD_SUCCEEDED, format!("{target_key} reloaded")));
            } else {
                entry.last_error = error.clone();
                status.set_condition(Condition::new(CONDITION_DEGRADED, true, REASON_RELOAD_FAILED, format!("{target_key}: {error}")));
            }
        }
        StatusUpdate::ConditionLevel { condition } => {
            status.set_condition(condition.clone());
        }
    }
}

/// Applies a `StatusUpdate` against an in-memory status map, exercising the
/// exact transition the live worker performs without touching the API
/// server.
#[cfg(test)]
fn apply_delta_for_test(status: &mut crate::crd::ReloaderConfigStatus, update: StatusUpdate) {
    apply_delta(status, &update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ReloaderConfigStatus;

    #[test]
    fn config_level_update_inserts_hash_and_bumps_counter() {
        let mut status = ReloaderConfigStatus::default();
        apply_delta_for_test(
            &mut status,
            StatusUpdate::ConfigLevel {
                resource_key: "default/Secret/db".to_string(),
                hash: "abc123".to_string(),
                reload_count_delta: 1,
            },
        );
        assert_eq!(status.watched_hashes.get("default/Secret/db"), Some(&"abc123".to_string()));
        assert_eq!(status.reload_count, 1);
        assert!(status.last_reload_time.is_some());
    }

    #[test]
    fn config_level_update_with_empty_hash_removes_entry() {
        let mut status = ReloaderConfigStatus::default();
        status
            .watched_hashes
            .insert("default/Secret/db".to_string(), "old".to_string());
        apply_delta_for_test(
            &mut status,
            StatusUpdate::ConfigLevel {
                resource_key: "default/Secret/db".to_string(),
                hash: String::new(),
                reload_count_delta: 0,
            },
        );
        assert!(!status.watched_hashes.contains_key("default/Secret/db"));
        assert_eq!(status.reload_count, 0);
        assert!(status.last_reload_time.is_none());
    }

    #[test]
    fn target_level_success_clears_last_error_and_sets_pause() {
        let mut status = ReloaderConfigStatus::default();
        apply_delta_for_test(
            &mut status,
            StatusUpdate::TargetLevel {
                target_key: "default/Deployment/web".to_string(),
                success: true,
                error: String::new(),
                paused_until: Some("2026-07-27T00:05:00+00:00".to_string()),
            },
        );
        let target = &status.targets["default/Deployment/web"];
        assert_eq!(target.reload_count, 1);
        assert_eq!(target.last_error, "");
        assert_eq!(target.paused_until.as_deref(), Some("2026-07-27T00:05:00+00:00"));
    }

    #[test]
    fn target_level_failure_records_error_without_touching_counter() {
        let mut status = ReloaderConfigStatus::default();
        apply_delta_for_test(
            &mut status,
            StatusUpdate::TargetLevel {
                target_key: "default/Deployment/web".to_string(),
                success: false,
                error: "patch failed".to_string(),
                paused_until: None,
            },
        );
        let target = &status.targets["default/Deployment/web"];
        assert_eq!(target.reload_count, 0);
        assert_eq!(target.last_error, "patch failed");
    }
}
