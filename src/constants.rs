//! # Constants
//!
//! Shared constants used throughout the controller: reserved annotation
//! keys, the reserved environment variable scheme, and default timing
//! values. These mirror spec §6 ("Reserved annotations") exactly.

/// Hash the controller last processed, stored on Secrets/ConfigMaps.
pub const ANNOTATION_LAST_HASH: &str = "reloader.stakater.com/last-hash";

/// `"true"`/`"false"`: enable/disable auto-reload-by-reference on a workload.
pub const ANNOTATION_AUTO: &str = "reloader.stakater.com/auto";

/// Part 1 of targeted reload: opt a workload into "search" matching.
pub const ANNOTATION_SEARCH: &str = "reloader.stakater.com/search";

/// Part 2 of targeted reload: mark a Secret/ConfigMap as matchable.
pub const ANNOTATION_MATCH: &str = "reloader.stakater.com/match";

/// Skip this object entirely (any kind).
pub const ANNOTATION_IGNORE: &str = "reloader.stakater.com/ignore";

/// Comma-separated Secret names a workload wants reloaded on change.
pub const ANNOTATION_SECRET_RELOAD: &str = "secret.reloader.stakater.com/reload";

/// Comma-separated ConfigMap names a workload wants reloaded on change.
pub const ANNOTATION_CONFIGMAP_RELOAD: &str = "configmap.reloader.stakater.com/reload";

/// Kind-specific auto-reload-by-reference for Secrets.
pub const ANNOTATION_SECRET_AUTO: &str = "secret.reloader.stakater.com/auto";

/// Kind-specific auto-reload-by-reference for ConfigMaps.
pub const ANNOTATION_CONFIGMAP_AUTO: &str = "configmap.reloader.stakater.com/auto";

/// Override the default rollout strategy on a workload.
pub const ANNOTATION_ROLLOUT_STRATEGY: &str = "reloader.stakater.com/rollout-strategy";

/// RFC 3339 timestamp of the last reload, on the workload or pod template.
pub const ANNOTATION_LAST_RELOAD: &str = "reloader.stakater.com/last-reload";

/// JSON payload describing the resource that triggered the last reload.
pub const ANNOTATION_LAST_RELOADED_FROM: &str = "reloader.stakater.com/last-reloaded-from";

/// Pause-period annotation for Deployments.
pub const ANNOTATION_DEPLOYMENT_PAUSE_PERIOD: &str =
    "deployment.reloader.stakater.com/pause-period";
/// Pause-period annotation for StatefulSets.
pub const ANNOTATION_STATEFULSET_PAUSE_PERIOD: &str =
    "statefulset.reloader.stakater.com/pause-period";
/// Pause-period annotation for DaemonSets.
pub const ANNOTATION_DAEMONSET_PAUSE_PERIOD: &str = "daemonset.reloader.stakater.com/pause-period";

/// Legacy, also-reserved environment variable name some older manifests key off of.
pub const LEGACY_ENV_VAR_NAME: &str = "RELOADER_TRIGGERED_AT";

/// Rollout strategy token: mutate the pod template to provoke a rolling update.
pub const ROLLOUT_STRATEGY_ROLLOUT: &str = "rollout";
/// Rollout strategy token: delete pods directly, no template mutation.
pub const ROLLOUT_STRATEGY_RESTART: &str = "restart";

/// Reload strategy token: set an env var on the first container.
pub const RELOAD_STRATEGY_ENV_VARS: &str = "env-vars";
/// Reload strategy token: set pod-template annotations.
pub const RELOAD_STRATEGY_ANNOTATIONS: &str = "annotations";

/// Default HTTP server port for metrics and health probes.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Default HTTP server startup timeout (how long to wait for server to be ready).
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval.
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval for reconciliation errors (seconds).
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default exponential backoff starting value (milliseconds).
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value (milliseconds).
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds).
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds).
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Alert webhook per-request timeout (spec §4.6).
pub const ALERT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum status-write retry attempts before dropping with a logged error (spec §4.7).
pub const STATUS_QUEUE_MAX_ATTEMPTS: u32 = 5;

/// Status-queue retry backoff base (milliseconds), doubled per attempt.
pub const STATUS_QUEUE_BACKOFF_BASE_MS: u64 = 250;

/// Server-side-apply field manager name used for all workload and status patches.
pub const FIELD_MANAGER: &str = "reloader-controller";
