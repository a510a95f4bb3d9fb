//! # ReloaderConfig Status
//!
//! Status types for tracking watched-resource hashes, reload counts, and
//! per-target state (spec §3, §4.7, §7).

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of the ReloaderConfig resource.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReloaderConfigStatus {
    /// `"ns/kind/name"` -> last hash this config observed for that resource.
    #[serde(default)]
    pub watched_hashes: BTreeMap<String, String>,
    /// Monotonic count of successful reloads triggered by this config.
    #[serde(default)]
    pub reload_count: i64,
    /// RFC 3339 timestamp of the most recent successful reload.
    #[serde(default)]
    pub last_reload_time: Option<String>,
    /// `"ns/kind/name"` -> per-target status.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetStatus>,
    /// `Available`, `Progressing`, `Degraded`.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Spec generation this status reflects.
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

/// Per-target status entry (spec §4.7 state machine).
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    #[serde(default)]
    pub reload_count: i64,
    #[serde(default)]
    pub last_error: String,
    /// RFC 3339 timestamp; reloads before this time are suppressed.
    #[serde(default)]
    pub paused_until: Option<String>,
}

/// A condition in the `Available`/`Progressing`/`Degraded` trio.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(type_: &str, status: bool, reason: &str, message: impl Into<String>) -> Self {
        Self {
            r#type: type_.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            reason: Some(reason.to_string()),
            message: Some(message.into()),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

impl ReloaderConfigStatus {
    /// Replace the condition of the same `type` in place, or append it.
    pub fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|existing| existing.r#type == condition.r#type) {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }
}

pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_PROGRESSING: &str = "Progressing";
pub const CONDITION_DEGRADED: &str = "Degraded";

pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_RECONCILING: &str = "Reconciling";
pub const REASON_RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
pub const REASON_TARGET_NOT_FOUND: &str = "TargetNotFound";
pub const REASON_RELOAD_FAILED: &str = "ReloadFailed";
pub const REASON_RELOAD_SUCCEEDED: &str = "ReloadSucceeded";
