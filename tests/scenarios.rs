//! Scenario-level tests wiring the hash, reference, and targeted-reload
//! pieces together the way a real reconcile would, without a live API
//! server (spec §8). Component-level behavior is covered by the
//! `#[cfg(test)]` modules inside each source file; these exercise how the
//! pieces compose.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvVar, EnvVarSource, PodSpec, SecretKeySelector};

use reloader_controller::hash::{hash_configmap_data, hash_secret_data};
use reloader_controller::reference::{references, ResourceKind};
use reloader_controller::target::parse_pause_period;

fn pod_spec_referencing_secret_env(name: &str) -> PodSpec {
    PodSpec {
        containers: vec![Container {
            name: "app".to_string(),
            env: Some(vec![EnvVar {
                name: "DB_PASSWORD".to_string(),
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
        }],
        ..Default::default()
    }
}

/// Mirrors "rename-secret-under-env-vars": editing a Secret's data changes
/// its hash, which is the signal the reconciler uses to decide whether a
/// watched resource actually changed.
#[test]
fn secret_content_change_produces_a_different_hash() {
    let mut before = BTreeMap::new();
    before.insert("password".to_string(), b"old-value".to_vec());
    let mut after = BTreeMap::new();
    after.insert("password".to_string(), b"new-value".to_vec());

    assert_ne!(hash_secret_data(Some(&before)), hash_secret_data(Some(&after)));
    assert_eq!(hash_secret_data(Some(&before)), hash_secret_data(Some(&before)));
}

/// ConfigMap hashing folds `data` and `binaryData` together (spec §4.1),
/// so changing either changes the hash.
#[test]
fn configmap_hash_changes_when_binary_data_changes() {
    let mut string_data = BTreeMap::new();
    string_data.insert("app.yaml".to_string(), "a: 1".to_string());

    let mut binary_a = BTreeMap::new();
    binary_a.insert("cert.der".to_string(), vec![1, 2, 3]);
    let mut binary_b = BTreeMap::new();
    binary_b.insert("cert.der".to_string(), vec![4, 5, 6]);

    let hash_a = hash_configmap_data(Some(&string_data), Some(&binary_a));
    let hash_b = hash_configmap_data(Some(&string_data), Some(&binary_b));
    assert_ne!(hash_a, hash_b);
}

/// Mirrors "targeted-reload excludes unreferenced target": a pod spec that
/// doesn't mention the watched Secret at all must not pass the reference
/// check, regardless of what other Secrets it does reference.
#[test]
fn targeted_reload_excludes_workload_not_referencing_the_secret() {
    let pod_spec = pod_spec_referencing_secret_env("db-credentials");

    assert!(references(&pod_spec, ResourceKind::Secret, "db-credentials"));
    assert!(!references(&pod_spec, ResourceKind::Secret, "other-secret"));
    assert!(!references(&pod_spec, ResourceKind::ConfigMap, "db-credentials"));
}

/// Mirrors "pause-period-enforced": a pause period is only meaningful if it
/// parses; garbage strings must not silently become "no pause".
#[test]
fn pause_period_parses_go_style_durations() {
    assert_eq!(parse_pause_period("5m").unwrap(), std::time::Duration::from_secs(300));
    assert!(parse_pause_period("not-a-duration").is_err());
}
