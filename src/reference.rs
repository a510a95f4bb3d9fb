//! # Reference Checker
//!
//! Decides whether a pod spec references a given Secret or ConfigMap by
//! name (spec §4.2): env vars, envFrom, volumes, and projected-volume
//! sources, scanned across both main and init containers.

use k8s_openapi::api::core::v1::{Container, PodSpec, Volume};

/// The two kinds a watched resource can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Secret,
    ConfigMap,
}

/// Does `pod_spec` reference `(kind, name)` through any env var, envFrom,
/// volume, or projected-volume source?
pub fn references(pod_spec: &PodSpec, kind: ResourceKind, name: &str) -> bool {
    let containers = pod_spec.containers.iter();
    let init_containers = pod_spec.init_containers.iter().flatten();

    for container in containers.chain(init_containers) {
        if container_references(container, kind, name) {
            return true;
        }
    }

    if let Some(volumes) = &pod_spec.volumes {
        for volume in volumes {
            if volume_references(volume, kind, name) {
                return true;
            }
        }
    }

    false
}

fn container_references(container: &Container, kind: ResourceKind, name: &str) -> bool {
    if let Some(env) = &container.env {
        for var in env {
            if let Some(value_from) = &var.value_from {
                let matched = match kind {
                    ResourceKind::Secret => value_from
                        .secret_key_ref
                        .as_ref()
                        .is_some_and(|r| r.name == name),
                    ResourceKind::ConfigMap => value_from
                        .config_map_key_ref
                        .as_ref()
                        .is_some_and(|r| r.name == name),
                };
                if matched {
                    return true;
                }
            }
        }
    }

    if let Some(env_from) = &container.env_from {
        for source in env_from {
            let matched = match kind {
                ResourceKind::Secret => source
                    .secret_ref
                    .as_ref()
                    .is_some_and(|r| r.name == name),
                ResourceKind::ConfigMap => source
                    .config_map_ref
                    .as_ref()
                    .is_some_and(|r| r.name == name),
            };
            if matched {
                return true;
            }
        }
    }

    false
}

fn volume_references(volume: &Volume, kind: ResourceKind, name: &str) -> bool {
    match kind {
        ResourceKind::Secret => {
            if volume
                .secret
                .as_ref()
                .and_then(|s| s.secret_name.as_deref())
                == Some(name)
            {
                return true;
            }
        }
        ResourceKind::ConfigMap => {
            if volume
                .config_map
                .as_ref()
                .and_then(|c| c.name.as_deref())
                == Some(name)
            {
                return true;
            }
        }
    }

    if let Some(projected) = &volume.projected {
        if let Some(sources) = &projected.sources {
            for source in sources {
                let matched = match kind {
                    ResourceKind::Secret => source
                        .secret
                        .as_ref()
                        .and_then(|s| s.name.as_deref())
                        == Some(name),
                    ResourceKind::ConfigMap => source
                        .config_map
                        .as_ref()
                        .and_then(|c| c.name.as_deref())
                        == Some(name),
                };
                if matched {
                    return true;
                }
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ConfigMapEnvSource, ConfigMapKeySelector, ConfigMapProjection, ConfigMapVolumeSource,
        EnvFromSource, EnvVar, EnvVarSource, ProjectedVolumeSource, SecretEnvSource,
        SecretKeySelector, SecretProjection, SecretVolumeSource, VolumeProjection,
    };

    fn container_with_env_secret(name: &str) -> Container {
        Container {
            name: "app".to_string(),
            env: Some(vec![EnvVar {
                name: "PASSWORD".to_string(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: name.to_string(),
                        key: "password".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn detects_env_var_secret_reference() {
        let pod_spec = PodSpec {
            containers: vec![container_with_env_secret("db")],
            ..Default::default()
        };
        assert!(references(&pod_spec, ResourceKind::Secret, "db"));
        assert!(!references(&pod_spec, ResourceKind::Secret, "other"));
        assert!(!references(&pod_spec, ResourceKind::ConfigMap, "db"));
    }

    #[test]
    fn detects_env_var_configmap_reference() {
        let container = Container {
            name: "app".to_string(),
            env: Some(vec![EnvVar {
                name: "FLAG".to_string(),
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: "flags".to_string(),
                        key: "flag".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let pod_spec = PodSpec {
            containers: vec![container],
            ..Default::default()
        };
        assert!(references(&pod_spec, ResourceKind::ConfigMap, "flags"));
    }

    #[test]
    fn detects_env_from_reference() {
        let container = Container {
            name: "app".to_string(),
            env_from: Some(vec![EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: "s1".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let pod_spec = PodSpec {
            containers: vec![container],
            ..Default::default()
        };
        assert!(references(&pod_spec, ResourceKind::Secret, "s1"));
        assert!(!references(&pod_spec, ResourceKind::Secret, "s2"));
    }

    #[test]
    fn detects_volume_reference() {
        let pod_spec = PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                ..Default::default()
            }],
            volumes: Some(vec![Volume {
                name: "conf".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some("app-config".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert!(references(&pod_spec, ResourceKind::ConfigMap, "app-config"));
    }

    #[test]
    fn detects_projected_volume_reference() {
        let pod_spec = PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                ..Default::default()
            }],
            volumes: Some(vec![Volume {
                name: "proj".to_string(),
                projected: Some(ProjectedVolumeSource {
                    sources: Some(vec![VolumeProjection {
                        secret: Some(SecretProjection {
                            name: Some("proj-secret".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert!(references(&pod_spec, ResourceKind::Secret, "proj-secret"));
    }

    #[test]
    fn scans_init_containers_too() {
        let pod_spec = PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                ..Default::default()
            }],
            init_containers: Some(vec![container_with_env_secret("init-secret")]),
            ..Default::default()
        };
        assert!(references(&pod_spec, ResourceKind::Secret, "init-secret"));
    }

    #[test]
    fn unrelated_volume_does_not_match_configmap_name() {
        let pod_spec = PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                ..Default::default()
            }],
            volumes: Some(vec![Volume {
                name: "conf".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some("app-config".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };
        // Name matches but kind differs: a Secret volume named "app-config"
        // must not satisfy a ConfigMap reference check.
        assert!(!references(&pod_spec, ResourceKind::ConfigMap, "app-config"));
        assert!(references(&pod_spec, ResourceKind::Secret, "app-config"));
    }
}
