//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables (spec §5
//! "Shared state": read-only after startup).

use std::collections::BTreeMap;
use std::time::Duration;

use crate::target::{ReloadStrategy, RolloutStrategy};

/// Controller-level configuration.
///
/// All settings have sensible defaults and can be overridden via
/// environment variables. Environment variables are populated from a
/// ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Trigger reloads for newly created watched resources, not just updates.
    pub reload_on_create: bool,
    /// Attempt a delete-variant reload when a watched resource is removed.
    pub reload_on_delete: bool,
    /// Equality-only, comma-separated `key=value` label selector on the
    /// object's namespace; `None` matches every namespace.
    pub namespace_selector: Option<String>,
    /// Namespaces excluded from all reconciliation, regardless of selector.
    pub ignored_namespaces: Vec<String>,
    /// Rollout strategy applied when neither target nor config overrides it.
    pub default_rollout_strategy: RolloutStrategy,
    /// Reload strategy applied when neither target nor config overrides it.
    pub default_reload_strategy: ReloadStrategy,
    /// Reconciliation error requeue interval (seconds).
    pub reconciliation_error_requeue_secs: u64,
    /// Exponential backoff starting value (milliseconds).
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds).
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds).
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends cleanly (seconds).
    pub watch_restart_delay_after_end_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE).
    pub log_level: String,
    /// Log format (json, text).
    pub log_format: String,
    /// Metrics/health HTTP server port.
    pub metrics_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reload_on_create: false,
            reload_on_delete: false,
            namespace_selector: None,
            ignored_namespaces: Vec::new(),
            default_rollout_strategy: RolloutStrategy::DEFAULT,
            default_reload_strategy: ReloadStrategy::DEFAULT,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        use crate::constants::*;
        let defaults = Self::default();
        Self {
            reload_on_create: env_var_or_default_bool("RELOAD_ON_CREATE", defaults.reload_on_create),
            reload_on_delete: env_var_or_default_bool("RELOAD_ON_DELETE", defaults.reload_on_delete),
            namespace_selector: std::env::var("NAMESPACE_SELECTOR").ok().filter(|v| !v.is_empty()),
            ignored_namespaces: std::env::var("IGNORED_NAMESPACES")
                .ok()
                .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
            default_rollout_strategy: std::env::var("DEFAULT_ROLLOUT_STRATEGY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_rollout_strategy),
            default_reload_strategy: std::env::var("DEFAULT_RELOAD_STRATEGY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_reload_strategy),
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
        }
    }

    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }

    /// `true` when `namespace` must be skipped outright (spec §4.4
    /// "Namespace filter"), before any selector evaluation.
    pub fn is_namespace_ignored(&self, namespace: &str) -> bool {
        self.ignored_namespaces.iter().any(|ns| ns == namespace)
    }

    /// Evaluate `namespace_selector` against a namespace's labels. `None`
    /// selector always matches.
    pub fn namespace_labels_match(&self, labels: &BTreeMap<String, String>) -> bool {
        let Some(selector) = &self.namespace_selector else {
            return true;
        };
        selector.split(',').map(str::trim).filter(|s| !s.is_empty()).all(|clause| {
            match clause.split_once('=') {
                Some((key, value)) => labels.get(key.trim()).map(String::as_str) == Some(value.trim()),
                None => false,
            }
        })
    }
}

fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reload_on_create_and_delete_are_off() {
        let config = ControllerConfig::default();
        assert!(!config.reload_on_create);
        assert!(!config.reload_on_delete);
    }

    #[test]
    fn ignored_namespace_short_circuits_regardless_of_selector() {
        let mut config = ControllerConfig::default();
        config.ignored_namespaces = vec!["kube-system".to_string()];
        assert!(config.is_namespace_ignored("kube-system"));
        assert!(!config.is_namespace_ignored("default"));
    }

    #[test]
    fn namespace_selector_none_matches_everything() {
        let config = ControllerConfig::default();
        assert!(config.namespace_labels_match(&BTreeMap::new()));
    }

    #[test]
    fn namespace_selector_requires_every_clause_to_match() {
        let mut config = ControllerConfig::default();
        config.namespace_selector = Some("team=platform,env=prod".to_string());
        let mut labels = BTreeMap::new();
        labels.insert("team".to_string(), "platform".to_string());
        assert!(!config.namespace_labels_match(&labels));
        labels.insert("env".to_string(), "prod".to_string());
        assert!(config.namespace_labels_match(&labels));
    }
}
