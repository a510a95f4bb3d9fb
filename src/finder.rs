//! # Finder
//!
//! Enumerates CRD configs watching a resource and annotated workloads that
//! want a reload (spec §4.3).

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::warn;

use crate::constants;
use crate::crd::{IgnoreResource, IgnoredResourceKind, ReloaderConfig};
use crate::reference::{self, ResourceKind};
use crate::target::{ReloadStrategy, RolloutStrategy, Target};
use crate::workload::{Workload, WorkloadKind};

#[derive(Debug, thiserror::Error)]
pub enum FinderError {
    #[error("listing {kind} in namespace {namespace}: {source}")]
    List {
        kind: &'static str,
        namespace: String,
        #[source]
        source: kube::Error,
    },
    #[error("fetching {kind} {namespace}/{name}: {source}")]
    Get {
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

/// spec §4.3 `findConfigsWatchingResource`.
///
/// Enumerates `ReloaderConfig`s in `namespace`, skipping any bearing the
/// ignore annotation, and keeps those that watch `(kind, name)` either
/// explicitly or via `autoReloadAll` + reference.
pub async fn find_configs_watching_resource(
    client: &Client,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Result<Vec<ReloaderConfig>, FinderError> {
    let api: Api<ReloaderConfig> = Api::namespaced(client.clone(), namespace);
    let list = api
        .list(&ListParams::default())
        .await
        .map_err(|source| FinderError::List {
            kind: "ReloaderConfig",
            namespace: namespace.to_string(),
            source,
        })?;

    let mut matched = Vec::new();
    for config in list.items {
        if has_ignore_annotation(config.annotations()) {
            continue;
        }

        if config_watches_resource_explicitly(&config, kind, name) {
            matched.push(config);
            continue;
        }

        if config.spec.auto_reload_all
            && auto_reload_targets_reference(client, &config, kind, name, namespace).await?
        {
            matched.push(config);
        }
    }

    Ok(matched)
}

/// `true` if `config.spec.watchedResources` names `(kind, name)` directly.
fn config_watches_resource_explicitly(
    config: &ReloaderConfig,
    kind: ResourceKind,
    name: &str,
) -> bool {
    match kind {
        ResourceKind::Secret => config
            .spec
            .watched_resources
            .secrets
            .iter()
            .any(|n| n == name),
        ResourceKind::ConfigMap => config
            .spec
            .watched_resources
            .config_maps
            .iter()
            .any(|n| n == name),
    }
}

/// `true` if any of `config`'s own-namespace targets reference `(kind, name)`.
async fn auto_reload_targets_reference(
    client: &Client,
    config: &ReloaderConfig,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Result<bool, FinderError> {
    for target in &config.spec.targets {
        let target_namespace = target.namespace.as_deref().unwrap_or(namespace);
        if target_namespace != namespace {
            continue;
        }
        let pod_spec = fetch_pod_spec(client, target.kind, target_namespace, &target.name).await?;
        if let Some(pod_spec) = pod_spec {
            if reference::references(&pod_spec, kind, name) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// spec §4.3 `findAnnotatedWorkloads`.
///
/// Enumerates Deployments/StatefulSets/DaemonSets in `namespace` and applies
/// the precedence rules to decide inclusion.
pub async fn find_annotated_workloads(
    client: &Client,
    resource_kind: ResourceKind,
    name: &str,
    namespace: &str,
    resource_annotations: Option<&BTreeMap<String, String>>,
    controller_defaults: (RolloutStrategy, ReloadStrategy),
) -> Result<Vec<Target>, FinderError> {
    let mut targets = Vec::new();
    targets.extend(
        find_annotated_workloads_of_kind::<Deployment>(
            client,
            resource_kind,
            name,
            namespace,
            resource_annotations,
            controller_defaults,
        )
        .await?,
    );
    targets.extend(
        find_annotated_workloads_of_kind::<StatefulSet>(
            client,
            resource_kind,
            name,
            namespace,
            resource_annotations,
            controller_defaults,
        )
        .await?,
    );
    targets.extend(
        find_annotated_workloads_of_kind::<DaemonSet>(
            client,
            resource_kind,
            name,
            namespace,
            resource_annotations,
            controller_defaults,
        )
        .await?,
    );
    Ok(targets)
}

async fn find_annotated_workloads_of_kind<W>(
    client: &Client,
    resource_kind: ResourceKind,
    name: &str,
    namespace: &str,
    resource_annotations: Option<&BTreeMap<String, String>>,
    controller_defaults: (RolloutStrategy, ReloadStrategy),
) -> Result<Vec<Target>, FinderError>
where
    W: Workload
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + kube::Resource<Scope = kube::core::NamespaceResourceScope>
        + serde::de::DeserializeOwned
        + 'static,
{
    let api: Api<W> = Api::namespaced(client.clone(), namespace);
    let list = api
        .list(&ListParams::default())
        .await
        .map_err(|source| FinderError::List {
            kind: "workload",
            namespace: namespace.to_string(),
            source,
        })?;

    let mut targets = Vec::new();
    for workload in list.items {
        if let Some(target) = evaluate_workload(
            &workload,
            resource_kind,
            name,
            namespace,
            resource_annotations,
            controller_defaults,
        ) {
            targets.push(target);
        }
    }
    Ok(targets)
}

/// Applies the precedence rules (spec §4.3) to a single workload; returns
/// the materialized `Target` if it should be restarted.
fn evaluate_workload<W>(
    workload: &W,
    resource_kind: ResourceKind,
    name: &str,
    namespace: &str,
    resource_annotations: Option<&BTreeMap<String, String>>,
    controller_defaults: (RolloutStrategy, ReloadStrategy),
) -> Option<Target>
where
    W: Workload + ResourceExt + kube::Resource<Scope = kube::core::NamespaceResourceScope>,
{
    let annotations = workload.annotations();
    let workload_name = workload.name_any();

    if annotations.get(constants::ANNOTATION_IGNORE).map(String::as_str) == Some("true") {
        return None;
    }

    let references = || {
        workload
            .pod_template()
            .and_then(|t| t.spec.as_ref())
            .is_some_and(|spec| reference::references(spec, resource_kind, name))
    };

    let included = if let Some(auto) = annotations.get(constants::ANNOTATION_AUTO) {
        match auto.as_str() {
            "true" => references(),
            "false" => false,
            _ => false,
        }
    } else if let Some(type_auto) = annotations.get(type_specific_auto_annotation(resource_kind)) {
        type_auto == "true" && references()
    } else if let Some(reload_list) = annotations.get(named_reload_annotation(resource_kind)) {
        reload_list.split(',').map(str::trim).any(|n| n == name)
    } else if annotations.get(constants::ANNOTATION_SEARCH).map(String::as_str) == Some("true") {
        let resource_matches = resource_annotations
            .and_then(|a| a.get(constants::ANNOTATION_MATCH))
            .map(String::as_str)
            == Some("true");
        resource_matches && references()
    } else {
        false
    };

    if !included {
        return None;
    }

    let (default_rollout, default_reload) = controller_defaults;

    // An unknown rollout-strategy token is a per-target error (spec §7); the
    // target is skipped entirely rather than silently defaulted.
    let rollout_strategy = match annotations.get(constants::ANNOTATION_ROLLOUT_STRATEGY) {
        Some(raw) => match raw.parse() {
            Ok(strategy) => strategy,
            Err(_) => {
                warn!(workload = %workload_name, value = %raw, "unknown rollout strategy annotation, skipping target");
                return None;
            }
        },
        None => default_rollout,
    };

    // No per-workload reload-strategy annotation exists (spec §6); only the
    // controller-wide default applies to annotation-derived targets.
    let reload_strategy = default_reload;

    let pause_period_key = W::kind().pause_period_annotation();
    let pause_period = annotations
        .get(pause_period_key)
        .and_then(|raw| {
            crate::target::parse_pause_period(raw)
                .inspect_err(|err| {
                    warn!(workload = %workload_name, value = %raw, %err, "malformed pause-period annotation, ignoring");
                })
                .ok()
        });

    Some(Target {
        kind: W::kind(),
        name: workload_name,
        namespace: namespace.to_string(),
        rollout_strategy,
        reload_strategy,
        pause_period,
        require_reference: false,
        owner: None,
    })
}

fn type_specific_auto_annotation(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Secret => constants::ANNOTATION_SECRET_AUTO,
        ResourceKind::ConfigMap => constants::ANNOTATION_CONFIGMAP_AUTO,
    }
}

fn named_reload_annotation(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Secret => constants::ANNOTATION_SECRET_RELOAD,
        ResourceKind::ConfigMap => constants::ANNOTATION_CONFIGMAP_RELOAD,
    }
}

fn has_ignore_annotation(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(constants::ANNOTATION_IGNORE)
        .map(String::as_str)
        == Some("true")
}

pub(crate) async fn fetch_pod_spec(
    client: &Client,
    kind: WorkloadKind,
    namespace: &str,
    name: &str,
) -> Result<Option<k8s_openapi::api::core::v1::PodSpec>, FinderError> {
    let not_found_or_err = |source: kube::Error, kind: &'static str| -> Result<Option<_>, FinderError> {
        match &source {
            kube::Error::Api(e) if e.code == 404 => Ok(None),
            _ => Err(FinderError::Get {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            }),
        }
    };

    match kind {
        WorkloadKind::Deployment => {
            let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
            match api.get(name).await {
                Ok(w) => Ok(w.pod_template().and_then(|t| t.spec.clone())),
                Err(e) => not_found_or_err(e, "Deployment"),
            }
        }
        WorkloadKind::StatefulSet => {
            let api: Api<StatefulSet> = Api::namespaced(client.clone(), namespace);
            match api.get(name).await {
                Ok(w) => Ok(w.pod_template().and_then(|t| t.spec.clone())),
                Err(e) => not_found_or_err(e, "StatefulSet"),
            }
        }
        WorkloadKind::DaemonSet => {
            let api: Api<DaemonSet> = Api::namespaced(client.clone(), namespace);
            match api.get(name).await {
                Ok(w) => Ok(w.pod_template().and_then(|t| t.spec.clone())),
                Err(e) => not_found_or_err(e, "DaemonSet"),
            }
        }
    }
}

/// Drop any config whose `ignoreResources` matches `(kind, name, ns)`: kind
/// and name must equal; namespace matches either when specified and equal,
/// or when unspecified (wildcard over namespaces). Spec §4.4 "IgnoreResources".
pub fn filter_ignored_resources(
    configs: Vec<ReloaderConfig>,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Vec<ReloaderConfig> {
    configs
        .into_iter()
        .filter(|config| !config.spec.ignore_resources.iter().any(|ignore| {
            ignore_matches(ignore, kind, name, namespace)
        }))
        .collect()
}

fn ignore_matches(ignore: &IgnoreResource, kind: ResourceKind, name: &str, namespace: &str) -> bool {
    let kind_matches = matches!(
        (kind, ignore.kind),
        (ResourceKind::Secret, IgnoredResourceKind::Secret)
            | (ResourceKind::ConfigMap, IgnoredResourceKind::ConfigMap)
    );
    if !kind_matches || ignore.name != name {
        return false;
    }
    match &ignore.namespace {
        Some(ns) => ns == namespace,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ReloaderConfigSpec, WatchedResources};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_with(secrets: Vec<&str>, config_maps: Vec<&str>) -> ReloaderConfig {
        ReloaderConfig {
            metadata: ObjectMeta::default(),
            spec: ReloaderConfigSpec {
                watched_resources: WatchedResources {
                    secrets: secrets.into_iter().map(String::from).collect(),
                    config_maps: config_maps.into_iter().map(String::from).collect(),
                    enable_targeted_reload: false,
                },
                targets: vec![],
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
    fn explicit_watch_matches_by_name_and_kind() {
        let config = config_with(vec!["db"], vec!["app-config"]);
        assert!(config_watches_resource_explicitly(&config, ResourceKind::Secret, "db"));
        assert!(!config_watches_resource_explicitly(&config, ResourceKind::Secret, "other"));
        assert!(!config_watches_resource_explicitly(&config, ResourceKind::ConfigMap, "db"));
    }

    #[test]
    fn ignore_resources_wildcard_namespace_matches_any_namespace() {
        let ignore = IgnoreResource {
            kind: IgnoredResourceKind::Secret,
            name: "db".to_string(),
            namespace: None,
        };
        assert!(ignore_matches(&ignore, ResourceKind::Secret, "db", "ns-a"));
        assert!(ignore_matches(&ignore, ResourceKind::Secret, "db", "ns-b"));
        assert!(!ignore_matches(&ignore, ResourceKind::ConfigMap, "db", "ns-a"));
    }

    #[test]
    fn ignore_resources_specific_namespace_matches_only_that_one() {
        let ignore = IgnoreResource {
            kind: IgnoredResourceKind::Secret,
            name: "db".to_string(),
            namespace: Some("ns-a".to_string()),
        };
        assert!(ignore_matches(&ignore, ResourceKind::Secret, "db", "ns-a"));
        assert!(!ignore_matches(&ignore, ResourceKind::Secret, "db", "ns-b"));
    }

    #[test]
    fn filter_ignored_resources_drops_matching_configs() {
        let mut config = config_with(vec!["db"], vec![]);
        config.spec.ignore_resources.push(IgnoreResource {
            kind: IgnoredResourceKind::Secret,
            name: "db".to_string(),
            namespace: None,
        });
        let filtered = filter_ignored_resources(vec![config], ResourceKind::Secret, "db", "ns");
        assert!(filtered.is_empty());
    }
}
