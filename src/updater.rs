//! # Updater
//!
//! Applies a rollout/reload strategy to a single `Target` and tracks pause
//! state (spec §4.5).

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{EnvVar, Pod, PodTemplateSpec};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde::Serialize;
use tracing::warn;

use crate::constants::{self, FIELD_MANAGER};
use crate::crd::ReloaderConfig;
use crate::reference::ResourceKind;
use crate::target::{ReloadStrategy, RolloutStrategy, Target};
use crate::workload::{Workload, WorkloadKind};

#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
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
    #[error("listing pods for {namespace}/{name}: {source}")]
    ListPods {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("deleting pod {namespace}/{name}: {source}")]
    DeletePod {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("target {namespace}/{kind}/{name} has no pod template")]
    NoPodTemplate {
        kind: WorkloadKind,
        namespace: String,
        name: String,
    },
}

/// The `{"kind","name","namespace","hash"}` payload for `last-reloaded-from` (spec §6).
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq, Eq)]
struct LastReloadedFrom {
    kind: String,
    name: String,
    namespace: String,
    hash: String,
}

/// spec §4.5 `triggerReload`.
pub async fn trigger_reload(
    client: &Client,
    target: &Target,
    resource_kind: ResourceKind,
    resource_name: &str,
    resource_namespace: &str,
    resource_hash: &str,
) -> Result<(), UpdaterError> {
    match target.rollout_strategy {
        RolloutStrategy::Restart => restart_pods(client, target).await,
        RolloutStrategy::Rollout => {
            apply_rollout(client, target, |template| match target.reload_strategy {
                ReloadStrategy::EnvVars => {
                    set_env_var(template, resource_kind, resource_name, resource_hash);
                }
                ReloadStrategy::Annotations => {
                    set_last_reloaded_annotations(
                        template,
                        resource_kind,
                        resource_name,
                        resource_namespace,
                        resource_hash,
                    );
                }
            })
            .await?;
            post_success_pause_bookkeeping(client, target).await;
            Ok(())
        }
    }
}

/// spec §4.5 `triggerDeleteReload`.
pub async fn trigger_delete_reload(
    client: &Client,
    target: &Target,
    resource_kind: ResourceKind,
    resource_name: &str,
) -> Result<(), UpdaterError> {
    match target.rollout_strategy {
        RolloutStrategy::Restart => restart_pods(client, target).await,
        RolloutStrategy::Rollout => {
            let timestamp = chrono::Utc::now().to_rfc3339();
            apply_rollout(client, target, |template| match target.reload_strategy {
                ReloadStrategy::EnvVars => {
                    let value = format!("deleted-{timestamp}");
                    set_env_var_raw(template, resource_kind, resource_name, &value);
                    clear_last_reloaded_from(template);
                }
                ReloadStrategy::Annotations => {
                    set_annotation(template, constants::ANNOTATION_LAST_RELOAD, &timestamp);
                    clear_last_reloaded_from(template);
                }
            })
            .await?;
            Ok(())
        }
    }
}

/// spec §4.5 `isPaused`.
///
/// CRD-owned targets refetch the owning config to observe recent status
/// writes; annotation-owned targets consult the workload's `last-reload`
/// annotation and its own `pause_period`. Malformed timestamps are treated
/// as not paused.
pub async fn is_paused(client: &Client, target: &Target) -> Result<bool, UpdaterError> {
    match &target.owner {
        Some(owner) => {
            let api: Api<ReloaderConfig> = Api::namespaced(client.clone(), &owner.namespace);
            let config = match api.get(&owner.name).await {
                Ok(config) => config,
                Err(kube::Error::Api(e)) if e.code == 404 => return Ok(false),
                Err(source) => {
                    return Err(UpdaterError::Get {
                        kind: "ReloaderConfig",
                        namespace: owner.namespace.clone(),
                        name: owner.name.clone(),
                        source,
                    });
                }
            };
            let paused_until = config
                .status
                .as_ref()
                .and_then(|s| s.targets.get(&target.status_key()))
                .and_then(|t| t.paused_until.as_deref());
            Ok(is_in_future(paused_until))
        }
        None => {
            let Some(pause_period) = target.pause_period else {
                return Ok(false);
            };
            let last_reload = fetch_annotation(
                client,
                target.kind,
                &target.namespace,
                &target.name,
                constants::ANNOTATION_LAST_RELOAD,
            )
            .await?;
            let Some(last_reload) = last_reload else {
                return Ok(false);
            };
            let Ok(last_reload) = chrono::DateTime::parse_from_rfc3339(&last_reload) else {
                return Ok(false);
            };
            let resumes_at = last_reload + chrono::Duration::from_std(pause_period).unwrap_or_default();
            Ok(resumes_at > chrono::Utc::now())
        }
    }
}

fn is_in_future(timestamp: Option<&str>) -> bool {
    match timestamp.and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok()) {
        Some(t) => t > chrono::Utc::now(),
        None => false,
    }
}

async fn fetch_annotation(
    client: &Client,
    kind: WorkloadKind,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<Option<String>, UpdaterError> {
    macro_rules! fetch {
        ($ty:ty, $label:literal) => {{
            let api: Api<$ty> = Api::namespaced(client.clone(), namespace);
            match api.get(name).await {
                Ok(w) => Ok(w.annotations().get(key).cloned()),
                Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
                Err(source) => Err(UpdaterError::Get {
                    kind: $label,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                }),
            }
        }};
    }
    match kind {
        WorkloadKind::Deployment => fetch!(Deployment, "Deployment"),
        WorkloadKind::StatefulSet => fetch!(StatefulSet, "StatefulSet"),
        WorkloadKind::DaemonSet => fetch!(DaemonSet, "DaemonSet"),
    }
}

/// Delete every pod matching the workload's label selector. At least one
/// successful delete is required when pods exist; an empty selector match
/// returns success.
async fn restart_pods(client: &Client, target: &Target) -> Result<(), UpdaterError> {
    let selector = fetch_selector(client, target.kind, &target.namespace, &target.name).await?;
    let Some(selector) = selector else {
        return Ok(());
    };
    if selector.is_empty() {
        return Ok(());
    }

    let label_selector = selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");

    let pods: Api<Pod> = Api::namespaced(client.clone(), &target.namespace);
    let list = pods
        .list(&ListParams::default().labels(&label_selector))
        .await
        .map_err(|source| UpdaterError::ListPods {
            namespace: target.namespace.clone(),
            name: target.name.clone(),
            source,
        })?;

    if list.items.is_empty() {
        return Ok(());
    }

    let mut any_succeeded = false;
    let mut last_error = None;
    for pod in &list.items {
        let Some(pod_name) = pod.metadata.name.as_deref() else {
            continue;
        };
        match pods.delete(pod_name, &DeleteParams::default()).await {
            Ok(_) => any_succeeded = true,
            Err(source) => {
                warn!(
                    pod = pod_name,
                    target = %target.name,
                    %source,
                    "failed to delete pod for restart strategy"
                );
                last_error = Some(source);
            }
        }
    }

    match (any_succeeded, last_error) {
        (true, _) | (false, None) => Ok(()),
        (false, Some(source)) => Err(UpdaterError::DeletePod {
            namespace: target.namespace.clone(),
            name: target.name.clone(),
            source,
        }),
    }
}

async fn fetch_selector(
    client: &Client,
    kind: WorkloadKind,
    namespace: &str,
    name: &str,
) -> Result<Option<std::collections::BTreeMap<String, String>>, UpdaterError> {
    macro_rules! fetch {
        ($ty:ty, $label:literal) => {{
            let api: Api<$ty> = Api::namespaced(client.clone(), namespace);
            match api.get(name).await {
                Ok(w) => Ok(Some(Workload::selector(&w))),
                Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
                Err(source) => Err(UpdaterError::Get {
                    kind: $label,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                }),
            }
        }};
    }
    match kind {
        WorkloadKind::Deployment => fetch!(Deployment, "Deployment"),
        WorkloadKind::StatefulSet => fetch!(StatefulSet, "StatefulSet"),
        WorkloadKind::DaemonSet => fetch!(DaemonSet, "DaemonSet"),
    }
}

/// Fetch the target workload, mutate its pod template in memory, then patch
/// just `spec.template` back (the whole pod template is replaced, but it's
/// the freshly-fetched and correctly-mutated one).
async fn apply_rollout(
    client: &Client,
    target: &Target,
    mutate: impl FnOnce(&mut PodTemplateSpec),
) -> Result<(), UpdaterError> {
    macro_rules! patch_as {
        ($ty:ty, $label:literal) => {{
            let api: Api<$ty> = Api::namespaced(client.clone(), &target.namespace);
            let mut workload = api.get(&target.name).await.map_err(|source| UpdaterError::Get {
                kind: $label,
                namespace: target.namespace.clone(),
                name: target.name.clone(),
                source,
            })?;
            let Some(template) = Workload::pod_template_mut(&mut workload) else {
                return Err(UpdaterError::NoPodTemplate {
                    kind: target.kind,
                    namespace: target.namespace.clone(),
                    name: target.name.clone(),
                });
            };
            mutate(template);
            let template = template.clone();
            let patch = serde_json::json!({ "spec": { "template": template } });
            api.patch(&target.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                .await
                .map_err(|source| UpdaterError::Patch {
                    kind: $label,
                    namespace: target.namespace.clone(),
                    name: target.name.clone(),
                    source,
                })?;
        }};
    }

    match target.kind {
        WorkloadKind::Deployment => patch_as!(Deployment, "Deployment"),
        WorkloadKind::StatefulSet => patch_as!(StatefulSet, "StatefulSet"),
        WorkloadKind::DaemonSet => patch_as!(DaemonSet, "DaemonSet"),
    }
    Ok(())
}

/// For annotation-originated targets with a nonzero pause period, refresh
/// `last-reload` so pause accounting works (spec §4.5 "Post-success side effect").
async fn post_success_pause_bookkeeping(client: &Client, target: &Target) {
    if !target.is_annotation_derived() || target.pause_period.is_none() {
        return;
    }
    let timestamp = chrono::Utc::now().to_rfc3339();
    if let Err(err) = apply_rollout(client, target, |template| {
        set_annotation(template, constants::ANNOTATION_LAST_RELOAD, &timestamp);
    })
    .await
    {
        warn!(target = %target.name, %err, "failed to record last-reload timestamp for pause accounting");
    }
}

fn env_var_name(resource_kind: ResourceKind, resource_name: &str) -> String {
    let sanitized: String = resource_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    let kind_suffix = match resource_kind {
        ResourceKind::Secret => "SECRET",
        ResourceKind::ConfigMap => "CONFIGMAP",
    };
    format!("STAKATER_{sanitized}_{kind_suffix}")
}

fn set_env_var(template: &mut PodTemplateSpec, resource_kind: ResourceKind, resource_name: &str, value: &str) {
    set_env_var_raw(template, resource_kind, resource_name, value);
}

fn set_env_var_raw(template: &mut PodTemplateSpec, resource_kind: ResourceKind, resource_name: &str, value: &str) {
    let var_name = env_var_name(resource_kind, resource_name);
    let Some(spec) = template.spec.as_mut() else {
        return;
    };
    let Some(container) = spec.containers.first_mut() else {
        return;
    };
    let env = container.env.get_or_insert_with(Vec::new);
    match env.iter_mut().find(|e| e.name == var_name) {
        Some(existing) => existing.value = Some(value.to_string()),
        None => env.push(EnvVar {
            name: var_name,
            value: Some(value.to_string()),
            value_from: None,
        }),
    }
}

fn set_last_reloaded_annotations(
    template: &mut PodTemplateSpec,
    resource_kind: ResourceKind,
    resource_name: &str,
    resource_namespace: &str,
    hash: &str,
) {
    let timestamp = chrono::Utc::now().to_rfc3339();
    set_annotation(template, constants::ANNOTATION_LAST_RELOAD, &timestamp);
    let payload = LastReloadedFrom {
        kind: match resource_kind {
            ResourceKind::Secret => "Secret".to_string(),
            ResourceKind::ConfigMap => "ConfigMap".to_string(),
        },
        name: resource_name.to_string(),
        namespace: resource_namespace.to_string(),
        hash: hash.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&payload) {
        set_annotation(template, constants::ANNOTATION_LAST_RELOADED_FROM, &json);
    }
}

fn clear_last_reloaded_from(template: &mut PodTemplateSpec) {
    if let Some(meta) = template.metadata.as_mut() {
        if let Some(annotations) = meta.annotations.as_mut() {
            annotations.remove(constants::ANNOTATION_LAST_RELOADED_FROM);
        }
    }
}

fn set_annotation(template: &mut PodTemplateSpec, key: &str, value: &str) {
    let meta = template.metadata.get_or_insert_with(Default::default);
    meta.annotations
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec};

    fn blank_template() -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "app".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        }
    }

    #[test]
    fn env_var_name_sanitizes_and_uppercases() {
        assert_eq!(
            env_var_name(ResourceKind::Secret, "db-credentials"),
            "STAKATER_DB_CREDENTIALS_SECRET"
        );
        assert_eq!(
            env_var_name(ResourceKind::ConfigMap, "app.config"),
            "STAKATER_APP_CONFIG_CONFIGMAP"
        );
    }

    #[test]
    fn set_env_var_inserts_then_overwrites() {
        let mut template = blank_template();
        set_env_var(&mut template, ResourceKind::Secret, "db", "hash-a");
        set_env_var(&mut template, ResourceKind::Secret, "db", "hash-b");
        let container = &template.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.env.as_ref().unwrap().len(), 1);
        assert_eq!(
            container.env.as_ref().unwrap()[0].value.as_deref(),
            Some("hash-b")
        );
    }

    #[test]
    fn annotations_strategy_writes_timestamp_and_json_payload() {
        let mut template = blank_template();
        set_last_reloaded_annotations(&mut template, ResourceKind::ConfigMap, "app-config", "ns", "hash-x");
        let annotations = template.metadata.as_ref().unwrap().annotations.as_ref().unwrap();
        assert!(annotations.contains_key(constants::ANNOTATION_LAST_RELOAD));
        let payload: LastReloadedFrom =
            serde_json::from_str(&annotations[constants::ANNOTATION_LAST_RELOADED_FROM]).unwrap();
        assert_eq!(payload.kind, "ConfigMap");
        assert_eq!(payload.name, "app-config");
        assert_eq!(payload.hash, "hash-x");
    }

    #[test]
    fn clear_last_reloaded_from_removes_only_that_key() {
        let mut template = blank_template();
        set_last_reloaded_annotations(&mut template, ResourceKind::Secret, "db", "ns", "hash");
        clear_last_reloaded_from(&mut template);
        let annotations = template.metadata.as_ref().unwrap().annotations.as_ref().unwrap();
        assert!(!annotations.contains_key(constants::ANNOTATION_LAST_RELOADED_FROM));
        assert!(annotations.contains_key(constants::ANNOTATION_LAST_RELOAD));
    }

    #[test]
    fn identical_reload_calls_are_idempotent() {
        let mut a = blank_template();
        let mut b = blank_template();
        set_env_var(&mut a, ResourceKind::Secret, "db", "hash-a");
        set_env_var(&mut a, ResourceKind::Secret, "db", "hash-a");
        set_env_var(&mut b, ResourceKind::Secret, "db", "hash-a");
        assert_eq!(
            a.spec.as_ref().unwrap().containers[0].env,
            b.spec.as_ref().unwrap().containers[0].env
        );
    }

    #[test]
    fn is_in_future_treats_malformed_timestamp_as_not_paused() {
        assert!(!is_in_future(Some("not-a-timestamp")));
        assert!(!is_in_future(None));
    }
}
