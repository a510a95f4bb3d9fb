//! # Reconciler Core
//!
//! Implements spec §4.4. The spec describes a single untyped
//! `reconcile(key)` entry point that probes ReloaderConfig, then Secret,
//! then ConfigMap in turn; kube-rs's typed watch streams already
//! discriminate by kind, so the three probes become three entry points
//! (`reconcile_secret_applied`, `reconcile_configmap_applied`,
//! `reconcile_reloader_config`) converging on the same create/update/merge
//! logic below.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, warn};

use crate::alert::{self, Message};
use crate::config::ControllerConfig;
use crate::constants::{self, FIELD_MANAGER};
use crate::crd::{
    AlertingConfig, Condition, ReloaderConfig, CONDITION_AVAILABLE, CONDITION_DEGRADED,
    CONDITION_PROGRESSING, REASON_RECONCILED, REASON_RECONCILING, REASON_RESOURCE_NOT_FOUND,
    REASON_TARGET_NOT_FOUND,
};
use crate::finder::{self, FinderError};
use crate::key::{Kind as KeyKind, ResourceKey};
use crate::observability::metrics;
use crate::reference::{self, ResourceKind};
use crate::status_queue::{StatusQueueHandle, StatusUpdate};
use crate::target::Target;
use crate::updater;
use crate::workload::WorkloadKind;

#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    #[error("fetching {kind} {namespace}/{name}: {source}")]
    Get {
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("patching {kind} {namespace}/{name}: {source}")]
    Patch {
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error(transparent)]
    Finder(#[from] FinderError),
}

/// Shared context handed to every reconcile call.
///
/// Owning back-references are identifiers (namespace + name), never shared
/// mutable state (spec §9 "Owning back-references"); the only shared
/// mutable process-wide state is the status queue and this flag.
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub config: Arc<ControllerConfig>,
    pub status_queue: StatusQueueHandle,
    initialized: Arc<AtomicBool>,
}

impl Reconciler {
    pub fn new(client: Client, config: Arc<ControllerConfig>, status_queue: StatusQueueHandle) -> Self {
        Self {
            client,
            config,
            status_queue,
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set once the manager reports the initial cache sync/list is done for
    /// all three watches (spec §9 "Startup suppression").
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------

pub(crate) async fn reconcile_secret_applied(
    reconciler: &Reconciler,
    secret: &Secret,
) -> Result<(), ReconcilerError> {
    let namespace = secret.namespace().unwrap_or_default();
    let name = secret.name_any();
    let annotations = secret.annotations();
    handle_applied(reconciler, ResourceKind::Secret, &name, &namespace, annotations).await
}

pub(crate) async fn reconcile_configmap_applied(
    reconciler: &Reconciler,
    config_map: &ConfigMap,
) -> Result<(), ReconcilerError> {
    let namespace = config_map.namespace().unwrap_or_default();
    let name = config_map.name_any();
    let annotations = config_map.annotations();
    handle_applied(reconciler, ResourceKind::ConfigMap, &name, &namespace, annotations).await
}

pub(crate) async fn reconcile_secret_deleted(
    reconciler: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<(), ReconcilerError> {
    handle_deleted(reconciler, ResourceKind::Secret, name, namespace).await
}

pub(crate) async fn reconcile_configmap_deleted(
    reconciler: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<(), ReconcilerError> {
    handle_deleted(reconciler, ResourceKind::ConfigMap, name, namespace).await
}

/// Validates a `ReloaderConfig`'s watched resources and targets exist,
/// recording `Degraded=True` rather than failing the reconcile (spec §7).
pub(crate) async fn reconcile_reloader_config(
    reconciler: &Reconciler,
    config: &ReloaderConfig,
) -> Result<(), ReconcilerError> {
    let namespace = config.namespace().unwrap_or_default();
    if reconciler.config.is_namespace_ignored(&namespace) {
        return Ok(());
    }
    if !namespace_passes_selector(&reconciler.client, &reconciler.config, &namespace).await? {
        return Ok(());
    }

    let mut missing_resources = Vec::new();
    let mut missing_targets = Vec::new();

    for secret_name in &config.spec.watched_resources.secrets {
        if !resource_exists::<Secret>(&reconciler.client, &namespace, secret_name).await? {
            missing_resources.push(format!("Secret/{secret_name}"));
        }
    }
    for config_map_name in &config.spec.watched_resources.config_maps {
        if !resource_exists::<ConfigMap>(&reconciler.client, &namespace, config_map_name).await? {
            missing_resources.push(format!("ConfigMap/{config_map_name}"));
        }
    }
    for target in &config.spec.targets {
        let target_namespace = target.namespace.as_deref().unwrap_or(&namespace);
        if !workload_exists(&reconciler.client, target.kind, target_namespace, &target.name).await? {
            missing_targets.push(format!("{}/{}", target.kind, target.name));
        }
    }

    let condition = if !missing_resources.is_empty() {
        Condition::new(
            CONDITION_DEGRADED,
            true,
            REASON_RESOURCE_NOT_FOUND,
            format!("missing: {}", missing_resources.join(", ")),
        )
    } else if !missing_targets.is_empty() {
        Condition::new(
            CONDITION_DEGRADED,
            true,
            REASON_TARGET_NOT_FOUND,
            format!("missing: {}", missing_targets.join(", ")),
        )
    } else {
        Condition::new(CONDITION_AVAILABLE, true, REASON_RECONCILED, "all watched resources and targets exist")
    };

    let api: Api<ReloaderConfig> = Api::namespaced(reconciler.client.clone(), &namespace);
    let patch = serde_json::json!({
        "status": {
            "conditions": [condition],
            "observedGeneration": config.meta().generation,
        }
    });
    api.patch_status(&config.name_any(), &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(patch))
        .await
        .map_err(|source| ReconcilerError::Patch {
            kind: "ReloaderConfig",
            namespace,
            name: config.name_any(),
            source,
        })?;

    Ok(())
}

// ---------------------------------------------------------------------
// Update/create path (spec §4.4 "Update path", "Create path", "Merge")
// ---------------------------------------------------------------------

async fn handle_applied(
    reconciler: &Reconciler,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
    annotations: &BTreeMap<String, String>,
) -> Result<(), ReconcilerError> {
    if reconciler.config.is_namespace_ignored(namespace) {
        return Ok(());
    }
    if !namespace_passes_selector(&reconciler.client, &reconciler.config, namespace).await? {
        return Ok(());
    }
    if annotations.get(constants::ANNOTATION_IGNORE).map(String::as_str) == Some("true") {
        return Ok(());
    }

    let stored_hash = annotations.get(constants::ANNOTATION_LAST_HASH).map(String::as_str);
    let is_create = stored_hash.is_none();

    // Open Question (a) in spec §9: absence of the hash annotation is the
    // sole create signal. Preserved as-is.
    if is_create && !reconciler.is_initialized() {
        debug!(kind = kind_str(kind), namespace, name, "suppressing synthetic create before cache sync");
        return Ok(());
    }

    let new_hash = fetch_current_hash(&reconciler.client, kind, namespace, name).await?;
    let Some(new_hash) = new_hash else {
        // Object vanished between the watch event and this read; treat as
        // a delete for the purpose of downstream effects.
        return handle_deleted(reconciler, kind, name, namespace).await;
    };

    if !is_create && stored_hash == Some(new_hash.as_str()) {
        return Ok(());
    }

    reconcile_update_or_create(reconciler, kind, name, namespace, Some(annotations), &new_hash, is_create).await
}

async fn fetch_current_hash(
    client: &Client,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
) -> Result<Option<String>, ReconcilerError> {
    match kind {
        ResourceKind::Secret => {
            let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
            match api.get(name).await {
                Ok(secret) => {
                    let data: Option<BTreeMap<String, Vec<u8>>> = secret
                        .data
                        .as_ref()
                        .map(|d| d.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect());
                    Ok(Some(crate::hash::hash_secret_data(data.as_ref())))
                }
                Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
                Err(source) => Err(ReconcilerError::Get {
                    kind: "Secret",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                }),
            }
        }
        ResourceKind::ConfigMap => {
            let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
            match api.get(name).await {
                Ok(config_map) => {
                    let binary: Option<BTreeMap<String, Vec<u8>>> = config_map
                        .binary_data
                        .as_ref()
                        .map(|d| d.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect());
                    Ok(Some(crate::hash::hash_configmap_data(config_map.data.as_ref(), binary.as_ref())))
                }
                Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
                Err(source) => Err(ReconcilerError::Get {
                    kind: "ConfigMap",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                }),
            }
        }
    }
}

async fn reconcile_update_or_create(
    reconciler: &Reconciler,
    resource_kind: ResourceKind,
    name: &str,
    namespace: &str,
    resource_annotations: Option<&BTreeMap<String, String>>,
    new_hash: &str,
    is_create: bool,
) -> Result<(), ReconcilerError> {
    let configs = finder::find_configs_watching_resource(&reconciler.client, resource_kind, name, namespace).await?;
    let configs = finder::filter_ignored_resources(configs, resource_kind, name, namespace);

    let alerting_by_owner = alerting_by_owner(&configs);

    let mut targets = Vec::new();
    for config in &configs {
        let config_namespace = config.namespace().unwrap_or_else(|| namespace.to_string());
        targets.extend(merge_config_targets(config, &config_namespace, &reconciler.config));
    }
    targets.extend(
        finder::find_annotated_workloads(
            &reconciler.client,
            resource_kind,
            name,
            namespace,
            resource_annotations,
            (reconciler.config.default_rollout_strategy, reconciler.config.default_reload_strategy),
        )
        .await?,
    );

    let targets = filter_targeted_reload(&reconciler.client, targets, resource_kind, name).await;

    let should_trigger = !is_create || reconciler.config.reload_on_create;

    let mut success_counts: BTreeMap<(String, String), i64> = BTreeMap::new();
    if should_trigger && !targets.is_empty() {
        for config in &configs {
            let config_namespace = config.namespace().unwrap_or_else(|| namespace.to_string());
            reconciler.status_queue.enqueue(
                config_namespace,
                config.name_any(),
                StatusUpdate::ConditionLevel {
                    condition: Condition::new(CONDITION_PROGRESSING, true, REASON_RECONCILING, "reload in progress"),
                },
            );
        }
    }
    if should_trigger {
        for target in &targets {
            let succeeded = reload_one_target(reconciler, &alerting_by_owner, target, resource_kind, name, namespace, new_hash).await;
            if succeeded {
                if let Some(owner) = &target.owner {
                    *success_counts.entry((owner.namespace.clone(), owner.name.clone())).or_insert(0) += 1;
                }
            }
        }
    }

    let resource_key = ResourceKey::new(namespace, resource_key_kind(resource_kind), name).to_string();
    for config in &configs {
        let config_namespace = config.namespace().unwrap_or_else(|| namespace.to_string());
        let delta = *success_counts.get(&(config_namespace.clone(), config.name_any())).unwrap_or(&0);
        reconciler.status_queue.enqueue(
            config_namespace,
            config.name_any(),
            StatusUpdate::ConfigLevel {
                resource_key: resource_key.clone(),
                hash: new_hash.to_string(),
                reload_count_delta: delta,
            },
        );
    }

    patch_hash_annotation(&reconciler.client, resource_kind, namespace, name, new_hash).await?;

    Ok(())
}

// ---------------------------------------------------------------------
// Delete path (spec §4.4 "Delete path")
// ---------------------------------------------------------------------

async fn handle_deleted(
    reconciler: &Reconciler,
    resource_kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Result<(), ReconcilerError> {
    if !reconciler.config.reload_on_delete {
        return Ok(());
    }
    // Open Question (b) in spec §9: both Secret and ConfigMap delete
    // handlers are probed independently and may both fire for same-named
    // resources in the same namespace. Preserved as-is.
    if !reconciler.is_initialized() {
        return Ok(());
    }
    if reconciler.config.is_namespace_ignored(namespace) {
        return Ok(());
    }
    if !namespace_passes_selector(&reconciler.client, &reconciler.config, namespace).await? {
        return Ok(());
    }

    let configs = finder::find_configs_watching_resource(&reconciler.client, resource_kind, name, namespace).await?;
    let configs = finder::filter_ignored_resources(configs, resource_kind, name, namespace);
    let alerting_by_owner = alerting_by_owner(&configs);

    let mut targets = Vec::new();
    for config in &configs {
        let config_namespace = config.namespace().unwrap_or_else(|| namespace.to_string());
        targets.extend(merge_config_targets(config, &config_namespace, &reconciler.config));
    }
    targets.extend(
        finder::find_annotated_workloads(
            &reconciler.client,
            resource_kind,
            name,
            namespace,
            None,
            (reconciler.config.default_rollout_strategy, reconciler.config.default_reload_strategy),
        )
        .await?,
    );

    let targets = filter_targeted_reload(&reconciler.client, targets, resource_kind, name).await;

    let mut any_succeeded = false;
    for target in &targets {
        if delete_one_target(reconciler, &alerting_by_owner, target, resource_kind, name, namespace).await {
            any_succeeded = true;
        }
    }

    if any_succeeded {
        let resource_key = ResourceKey::new(namespace, resource_key_kind(resource_kind), name).to_string();
        for config in &configs {
            let config_namespace = config.namespace().unwrap_or_else(|| namespace.to_string());
            reconciler.status_queue.enqueue(
                config_namespace,
                config.name_any(),
                StatusUpdate::ConfigLevel {
                    resource_key: resource_key.clone(),
                    hash: String::new(),
                    reload_count_delta: 0,
                },
            );
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------

/// spec §4.4 "Merge": resolve effective strategy, namespace, and the
/// targeted-reload check flag for each target declared by `config`.
fn merge_config_targets(config: &ReloaderConfig, config_namespace: &str, controller_config: &ControllerConfig) -> Vec<Target> {
    let config_default_rollout = config.spec.default_rollout_strategy.as_deref().and_then(|s| s.parse().ok());
    let config_default_reload = config.spec.default_reload_strategy.as_deref().and_then(|s| s.parse().ok());
    let owner = crate::key::NamespacedKey {
        namespace: config_namespace.to_string(),
        name: config.name_any(),
    };
    let targeted_reload_on = config.spec.watched_resources.enable_targeted_reload;

    config
        .spec
        .targets
        .iter()
        .filter_map(|spec| {
            let rollout_strategy = match &spec.rollout_strategy {
                Some(raw) => match raw.parse() {
                    Ok(strategy) => strategy,
                    Err(_) => {
                        warn!(target = %spec.name, value = %raw, "unknown rollout strategy on target, skipping");
                        return None;
                    }
                },
                None => config_default_rollout.unwrap_or(controller_config.default_rollout_strategy),
            };
            let reload_strategy = match &spec.reload_strategy {
                Some(raw) => match raw.parse() {
                    Ok(strategy) => strategy,
                    Err(_) => {
                        warn!(target = %spec.name, value = %raw, "unknown reload strategy on target, skipping");
                        return None;
                    }
                },
                None => config_default_reload.unwrap_or(controller_config.default_reload_strategy),
            };
            let namespace = spec.namespace.clone().unwrap_or_else(|| config_namespace.to_string());
            let pause_period = spec.pause_period.as_deref().and_then(|raw| {
                crate::target::parse_pause_period(raw)
                    .inspect_err(|err| warn!(target = %spec.name, value = %raw, %err, "malformed pause-period, ignoring"))
                    .ok()
            });

            Some(Target {
                kind: spec.kind,
                name: spec.name.clone(),
                namespace,
                rollout_strategy,
                reload_strategy,
                pause_period,
                require_reference: targeted_reload_on && spec.require_reference,
                owner: Some(owner.clone()),
            })
        })
        .collect()
}

/// spec §4.4 "Targeted-reload filtering".
async fn filter_targeted_reload(
    client: &Client,
    targets: Vec<Target>,
    resource_kind: ResourceKind,
    resource_name: &str,
) -> Vec<Target> {
    let mut kept = Vec::with_capacity(targets.len());
    for target in targets {
        if !target.require_reference {
            kept.push(target);
            continue;
        }
        match finder::fetch_pod_spec(client, target.kind, &target.namespace, &target.name).await {
            Ok(Some(pod_spec)) => {
                if reference::references(&pod_spec, resource_kind, resource_name) {
                    kept.push(target);
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(target = %target.name, %err, "failed to fetch workload for targeted-reload check, keeping target");
                kept.push(target);
            }
        }
    }
    kept
}

async fn reload_one_target(
    reconciler: &Reconciler,
    alerting_by_owner: &BTreeMap<(String, String), AlertingConfig>,
    target: &Target,
    resource_kind: ResourceKind,
    resource_name: &str,
    resource_namespace: &str,
    resource_hash: &str,
) -> bool {
    match updater::is_paused(&reconciler.client, target).await {
        Ok(true) => {
            metrics::increment_reload_skipped_paused();
            return false;
        }
        Ok(false) => {}
        Err(err) => {
            warn!(target = %target.name, %err, "failed to check pause state, attempting reload anyway");
        }
    }

    metrics::increment_reload_attempts(target.kind.as_str());
    let result = updater::trigger_reload(&reconciler.client, target, resource_kind, resource_name, resource_namespace, resource_hash).await;
    let success = result.is_ok();
    if !success {
        metrics::increment_reload_failures(target.kind.as_str());
    }

    if let Err(err) = &result {
        warn!(target = %target.name, %err, "reload failed");
    } else {
        info!(target = %target.name, kind = %target.kind, resource = resource_name, "reload triggered");
    }

    if let Some(owner) = &target.owner {
        let paused_until = if success {
            target
                .pause_period
                .map(|period| (chrono::Utc::now() + chrono::Duration::from_std(period).unwrap_or_default()).to_rfc3339())
        } else {
            None
        };
        reconciler.status_queue.enqueue(
            owner.namespace.clone(),
            owner.name.clone(),
            StatusUpdate::TargetLevel {
                target_key: target.status_key(),
                success,
                error: result.as_ref().err().map(ToString::to_string).unwrap_or_default(),
                paused_until,
            },
        );
    }

    dispatch_alert(reconciler, alerting_by_owner, target, resource_kind, resource_name, &result).await;
    success
}

async fn delete_one_target(
    reconciler: &Reconciler,
    alerting_by_owner: &BTreeMap<(String, String), AlertingConfig>,
    target: &Target,
    resource_kind: ResourceKind,
    resource_name: &str,
    _resource_namespace: &str,
) -> bool {
    metrics::increment_reload_attempts(target.kind.as_str());
    let result = updater::trigger_delete_reload(&reconciler.client, target, resource_kind, resource_name).await;
    let success = result.is_ok();
    if !success {
        metrics::increment_reload_failures(target.kind.as_str());
        if let Some(err) = result.as_ref().err() {
            warn!(target = %target.name, %err, "delete reload failed");
        }
    }

    if let Some(owner) = &target.owner {
        reconciler.status_queue.enqueue(
            owner.namespace.clone(),
            owner.name.clone(),
            StatusUpdate::TargetLevel {
                target_key: target.status_key(),
                success,
                error: result.as_ref().err().map(ToString::to_string).unwrap_or_default(),
                paused_until: None,
            },
        );
    }

    dispatch_alert(reconciler, alerting_by_owner, target, resource_kind, resource_name, &result).await;
    success
}

async fn dispatch_alert<E: std::fmt::Display>(
    reconciler: &Reconciler,
    alerting_by_owner: &BTreeMap<(String, String), AlertingConfig>,
    target: &Target,
    resource_kind: ResourceKind,
    resource_name: &str,
    result: &Result<(), E>,
) {
    let Some(owner) = &target.owner else {
        return;
    };
    let Some(alerting) = alerting_by_owner.get(&(owner.namespace.clone(), owner.name.clone())) else {
        return;
    };

    let message = Message {
        title: "Reloader".to_string(),
        text: "reload triggered".to_string(),
        workload_kind: target.kind.to_string(),
        workload_name: target.name.clone(),
        workload_namespace: target.namespace.clone(),
        resource_kind: kind_str(resource_kind).to_string(),
        resource_name: resource_name.to_string(),
        rollout_strategy: target.rollout_strategy.to_string(),
        error: result.as_ref().err().map(ToString::to_string),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    let errors = alert::dispatch(&reconciler.client, alerting, &owner.namespace, &message).await;
    for error in errors {
        metrics::increment_alert_failures(alert_sender_label(&error));
        warn!(target = %target.name, %error, "alert delivery failed");
    }
}

fn alert_sender_label(error: &alert::AlertError) -> &'static str {
    match error {
        alert::AlertError::MissingDestination { sender }
        | alert::AlertError::SecretFetch { sender, .. }
        | alert::AlertError::SecretKeyMissing { sender, .. }
        | alert::AlertError::Request { sender, .. }
        | alert::AlertError::NonSuccessStatus { sender, .. } => sender,
    }
}

fn alerting_by_owner(configs: &[ReloaderConfig]) -> BTreeMap<(String, String), AlertingConfig> {
    configs
        .iter()
        .filter_map(|config| {
            let alerting = config.spec.alerting.clone()?;
            let namespace = config.namespace().unwrap_or_default();
            Some(((namespace, config.name_any()), alerting))
        })
        .collect()
}

async fn patch_hash_annotation(
    client: &Client,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    hash: &str,
) -> Result<(), ReconcilerError> {
    let patch = serde_json::json!({
        "metadata": { "annotations": { constants::ANNOTATION_LAST_HASH: hash } }
    });
    match kind {
        ResourceKind::Secret => {
            let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
            api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                .await
                .map_err(|source| ReconcilerError::Patch {
                    kind: "Secret",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })?;
        }
        ResourceKind::ConfigMap => {
            let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
            api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                .await
                .map_err(|source| ReconcilerError::Patch {
                    kind: "ConfigMap",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })?;
        }
    }
    Ok(())
}

async fn namespace_passes_selector(client: &Client, config: &ControllerConfig, namespace: &str) -> Result<bool, ReconcilerError> {
    if config.namespace_selector.is_none() {
        return Ok(true);
    }
    let api: Api<Namespace> = Api::all(client.clone());
    match api.get(namespace).await {
        Ok(ns) => {
            let empty = BTreeMap::new();
            Ok(config.namespace_labels_match(ns.metadata.labels.as_ref().unwrap_or(&empty)))
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
        Err(source) => Err(ReconcilerError::Get {
            kind: "Namespace",
            namespace: namespace.to_string(),
            name: namespace.to_string(),
            source,
        }),
    }
}

async fn resource_exists<K>(client: &Client, namespace: &str, name: &str) -> Result<bool, ReconcilerError>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope> + Clone + std::fmt::Debug + serde::de::DeserializeOwned + 'static,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    match api.get(name).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
        Err(source) => Err(ReconcilerError::Get {
            kind: "resource",
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        }),
    }
}

async fn workload_exists(client: &Client, kind: WorkloadKind, namespace: &str, name: &str) -> Result<bool, ReconcilerError> {
    match kind {
        WorkloadKind::Deployment => resource_exists::<Deployment>(client, namespace, name).await,
        WorkloadKind::StatefulSet => resource_exists::<StatefulSet>(client, namespace, name).await,
        WorkloadKind::DaemonSet => resource_exists::<DaemonSet>(client, namespace, name).await,
    }
}

fn resource_key_kind(kind: ResourceKind) -> KeyKind {
    match kind {
        ResourceKind::Secret => KeyKind::Secret,
        ResourceKind::ConfigMap => KeyKind::ConfigMap,
    }
}

fn kind_str(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Secret => "Secret",
        ResourceKind::ConfigMap => "ConfigMap",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ReloaderConfigSpec, TargetSpec, WatchedResources};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_with_targets(targets: Vec<TargetSpec>, enable_targeted_reload: bool) -> ReloaderConfig {
        ReloaderConfig {
            metadata: ObjectMeta {
                name: Some("web-reload".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: ReloaderConfigSpec {
                watched_resources: WatchedResources {
                    secrets: vec!["db".to_string()],
                    config_maps: vec![],
                    enable_targeted_reload,
                },
                targets,
                ignore_resources: vec![],
                auto_reload_all: false,
                default_rollout_strategy: None,
                default_reload_strategy: None,
                alerting: None,
            },
            status: None,
        }
    }

    #[test]
    fn merge_config_targets_resolves_precedence_and_defaults() {
        let config = config_with_targets(
            vec![TargetSpec {
                kind: WorkloadKind::Deployment,
                name: "web".to_string(),
                namespace: None,
                rollout_strategy: Some("restart".to_string()),
                reload_strategy: None,
                pause_period: Some("5m".to_string()),
                require_reference: true,
            }],
            true,
        );
        let controller_config = ControllerConfig::default();
        let targets = merge_config_targets(&config, "default", &controller_config);
        assert_eq!(targets.len(), 1);
        let target = &targets[0];
        assert_eq!(target.rollout_strategy, crate::target::RolloutStrategy::Restart);
        assert_eq!(target.reload_strategy, controller_config.default_reload_strategy);
        assert_eq!(target.namespace, "default");
        assert!(target.require_reference);
        assert!(target.pause_period.is_some());
        assert_eq!(target.owner.as_ref().unwrap().name, "web-reload");
    }

    #[test]
    fn merge_config_targets_require_reference_off_when_targeted_reload_disabled() {
        let config = config_with_targets(
            vec![TargetSpec {
                kind: WorkloadKind::Deployment,
                name: "web".to_string(),
                namespace: None,
                rollout_strategy: None,
                reload_strategy: None,
                pause_period: None,
                require_reference: true,
            }],
            false,
        );
        let controller_config = ControllerConfig::default();
        let targets = merge_config_targets(&config, "default", &controller_config);
        assert!(!targets[0].require_reference);
    }

    #[test]
    fn merge_config_targets_skips_target_with_unknown_rollout_strategy() {
        let config = config_with_targets(
            vec![TargetSpec {
                kind: WorkloadKind::Deployment,
                name: "web".to_string(),
                namespace: None,
                rollout_strategy: Some("bogus".to_string()),
                reload_strategy: None,
                pause_period: None,
                require_reference: false,
            }],
            false,
        );
        let controller_config = ControllerConfig::default();
        let targets = merge_config_targets(&config, "default", &controller_config);
        assert!(targets.is_empty());
    }

    #[test]
    fn alerting_by_owner_indexes_only_configs_with_alerting_set() {
        let mut with_alert = config_with_targets(vec![], false);
        with_alert.spec.alerting = Some(AlertingConfig::default());
        let without_alert = config_with_targets(vec![], false);
        let map = alerting_by_owner(&[with_alert, without_alert]);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&("default".to_string(), "web-reload".to_string())));
    }
}
