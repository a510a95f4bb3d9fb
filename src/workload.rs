//! # Workload capability
//!
//! Deployments, StatefulSets, and DaemonSets are identical at the
//! pod-template level for everything this controller does with them: get,
//! list, patch the template, delete pods. Rather than replicate per-kind
//! code through the reconciler, Finder, and Updater, `WorkloadKind` names
//! which one a `Target` refers to, and the `Workload` trait (implemented
//! for each k8s-openapi type) exposes the one capability set the rest of
//! the crate needs.
//!
//! Grounded on `juv-kube-autorollout`'s `Rollout` trait, which takes the
//! same approach of a single trait impl'd three times over
//! `k8s_openapi::api::apps::v1::{Deployment, StatefulSet, DaemonSet}`.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three workload kinds this controller restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
        }
    }

    /// Annotation key naming the type-specific pause-period annotation for this kind.
    pub fn pause_period_annotation(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => crate::constants::ANNOTATION_DEPLOYMENT_PAUSE_PERIOD,
            WorkloadKind::StatefulSet => crate::constants::ANNOTATION_STATEFULSET_PAUSE_PERIOD,
            WorkloadKind::DaemonSet => crate::constants::ANNOTATION_DAEMONSET_PAUSE_PERIOD,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deployment" => Ok(WorkloadKind::Deployment),
            "StatefulSet" => Ok(WorkloadKind::StatefulSet),
            "DaemonSet" => Ok(WorkloadKind::DaemonSet),
            other => Err(format!("unknown workload kind {other:?}")),
        }
    }
}

/// Capability set shared by Deployment/StatefulSet/DaemonSet.
///
/// Metadata access (annotations, name, namespace) already comes for free
/// from `kube::ResourceExt`, which every k8s-openapi type implements; this
/// trait covers only what that doesn't: the pod template and selector.
pub trait Workload {
    fn kind() -> WorkloadKind;

    /// Name/value label selector used to find the workload's pods.
    fn selector(&self) -> BTreeMap<String, String>;

    fn pod_template(&self) -> Option<&PodTemplateSpec>;

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec>;
}

impl Workload for Deployment {
    fn kind() -> WorkloadKind {
        WorkloadKind::Deployment
    }

    fn selector(&self) -> BTreeMap<String, String> {
        self.spec
            .as_ref()
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default()
    }

    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

impl Workload for StatefulSet {
    fn kind() -> WorkloadKind {
        WorkloadKind::StatefulSet
    }

    fn selector(&self) -> BTreeMap<String, String> {
        self.spec
            .as_ref()
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default()
    }

    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

impl Workload for DaemonSet {
    fn kind() -> WorkloadKind {
        WorkloadKind::DaemonSet
    }

    fn selector(&self) -> BTreeMap<String, String> {
        self.spec
            .as_ref()
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default()
    }

    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_kind_round_trips_through_str() {
        for kind in [
            WorkloadKind::Deployment,
            WorkloadKind::StatefulSet,
            WorkloadKind::DaemonSet,
        ] {
            let parsed: WorkloadKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn pause_period_annotation_is_kind_specific() {
        assert_ne!(
            WorkloadKind::Deployment.pause_period_annotation(),
            WorkloadKind::StatefulSet.pause_period_annotation()
        );
    }
}
