//! # ReloaderConfig Spec
//!
//! Main CRD specification types and default values (spec §3 "ReloaderConfig").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::workload::WorkloadKind;

/// ReloaderConfig Custom Resource Definition
///
/// Declares the Secrets/ConfigMaps this controller watches in a namespace
/// and the workloads that should restart when their content changes.
///
/// # Example
///
/// ```yaml
/// apiVersion: reloader.stakater.com/v1beta1
/// kind: ReloaderConfig
/// metadata:
///   name: web-reload
///   namespace: default
/// spec:
///   watchedResources:
///     secrets: ["db-credentials"]
///     configMaps: ["app-config"]
///     enableTargetedReload: true
///   targets:
///     - kind: Deployment
///       name: web
///       requireReference: true
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ReloaderConfig",
    group = "reloader.stakater.com",
    version = "v1beta1",
    namespaced,
    status = "crate::crd::ReloaderConfigStatus",
    shortname = "rlc",
    printcolumn = r#"{"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}, {"name":"ReloadCount", "type":"integer", "jsonPath":".status.reloadCount"}, {"name":"LastReload", "type":"string", "jsonPath":".status.lastReloadTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReloaderConfigSpec {
    /// Secrets/ConfigMaps this config watches.
    pub watched_resources: WatchedResources,
    /// Workloads to restart when a watched resource changes.
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    /// `(kind, name, namespace)` exclusions applied after this config is
    /// otherwise selected by `findConfigsWatchingResource`.
    #[serde(default)]
    pub ignore_resources: Vec<IgnoreResource>,
    /// Include this config for any watched resource referenced by any of
    /// its targets' pod specs, even if not listed under `watchedResources`.
    #[serde(default = "default_false")]
    pub auto_reload_all: bool,
    /// Default rollout strategy for targets that don't override it.
    #[serde(default)]
    pub default_rollout_strategy: Option<String>,
    /// Default reload strategy for targets that don't override it.
    #[serde(default)]
    pub default_reload_strategy: Option<String>,
    /// Alert destinations applied to reloads triggered by this config.
    #[serde(default)]
    pub alerting: Option<AlertingConfig>,
}

/// Secret/ConfigMap names this config watches.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WatchedResources {
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub config_maps: Vec<String>,
    /// When set, targets are restarted only if they reference the changed
    /// resource (subject to each target's own `requireReference`).
    #[serde(default = "default_false")]
    pub enable_targeted_reload: bool,
}

/// A workload this config wants restarted on a watched-resource change.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    pub kind: WorkloadKind,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub rollout_strategy: Option<String>,
    #[serde(default)]
    pub reload_strategy: Option<String>,
    /// Go-style duration string, e.g. `"5m"`.
    #[serde(default)]
    pub pause_period: Option<String>,
    #[serde(default = "default_false")]
    pub require_reference: bool,
}

/// A `(kind, name, namespace)` exclusion. Unspecified namespace is a wildcard.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreResource {
    pub kind: IgnoredResourceKind,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// The two kinds that can appear in `ignoreResources` (a subset of [`WorkloadKind`]'s universe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum IgnoredResourceKind {
    Secret,
    ConfigMap,
}

/// Global alert destination configuration, applied when a target-level
/// destination isn't set.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertingConfig {
    #[serde(default)]
    pub slack: Option<WebhookRef>,
    #[serde(default)]
    pub teams: Option<WebhookRef>,
    #[serde(default)]
    pub gchat: Option<WebhookRef>,
    #[serde(default)]
    pub generic_webhook: Option<WebhookRef>,
}

/// A webhook URL, given directly or via a Secret key reference.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRef {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub secret_name: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

pub fn default_false() -> bool {
    false
}
