//! # Target
//!
//! The materialized reload instruction (spec §3 "Target (materialized)")
//! and the strategy tokens it carries.

use std::fmt;
use std::time::Duration;

use crate::key::NamespacedKey;
use crate::workload::WorkloadKind;

/// How a restart is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutStrategy {
    /// Mutate the pod template to provoke a rolling update.
    Rollout,
    /// Delete pods directly; the template is left untouched.
    Restart,
}

impl RolloutStrategy {
    pub const DEFAULT: Self = RolloutStrategy::Rollout;
}

impl fmt::Display for RolloutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RolloutStrategy::Rollout => crate::constants::ROLLOUT_STRATEGY_ROLLOUT,
            RolloutStrategy::Restart => crate::constants::ROLLOUT_STRATEGY_RESTART,
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RolloutStrategy {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            crate::constants::ROLLOUT_STRATEGY_ROLLOUT => Ok(RolloutStrategy::Rollout),
            crate::constants::ROLLOUT_STRATEGY_RESTART => Ok(RolloutStrategy::Restart),
            other => Err(StrategyError::UnknownRolloutStrategy(other.to_string())),
        }
    }
}

/// Under `RolloutStrategy::Rollout`, how the template mutation is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStrategy {
    /// Set a `STAKATER_<NAME>_<KIND>` env var on the first container.
    EnvVars,
    /// Set `last-reload`/`last-reloaded-from` pod-template annotations.
    Annotations,
}

impl ReloadStrategy {
    pub const DEFAULT: Self = ReloadStrategy::EnvVars;
}

impl fmt::Display for ReloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReloadStrategy::EnvVars => crate::constants::RELOAD_STRATEGY_ENV_VARS,
            ReloadStrategy::Annotations => crate::constants::RELOAD_STRATEGY_ANNOTATIONS,
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ReloadStrategy {
    type Err = StrategyError;

    /// The legacy token `"rollout"` is accepted here and normalized to
    /// `env-vars` (spec §6 "Rollout/reload strategy tokens").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            crate::constants::RELOAD_STRATEGY_ENV_VARS => Ok(ReloadStrategy::EnvVars),
            crate::constants::RELOAD_STRATEGY_ANNOTATIONS => Ok(ReloadStrategy::Annotations),
            crate::constants::ROLLOUT_STRATEGY_ROLLOUT => Ok(ReloadStrategy::EnvVars),
            other => Err(StrategyError::UnknownReloadStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error("unknown rollout strategy {0:?}")]
    UnknownRolloutStrategy(String),
    #[error("unknown reload strategy {0:?}")]
    UnknownReloadStrategy(String),
}

/// A fully resolved reload instruction, produced by the Finder and merge
/// step, consumed by the Updater.
#[derive(Debug, Clone)]
pub struct Target {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub rollout_strategy: RolloutStrategy,
    pub reload_strategy: ReloadStrategy,
    pub pause_period: Option<Duration>,
    pub require_reference: bool,
    /// `None` for annotation-derived targets; carries no shared reference,
    /// only an identifier to refetch by (spec §9 "Owning back-references").
    pub owner: Option<NamespacedKey>,
}

impl Target {
    /// `"<namespace>/<kind>/<name>"`, the key this target is addressed by
    /// in status maps and pause-state lookups.
    pub fn status_key(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.kind, self.name)
    }

    pub fn is_annotation_derived(&self) -> bool {
        self.owner.is_none()
    }
}

/// Parse a Go-style duration string (e.g. `"5m"`), per spec §6.
pub fn parse_pause_period(raw: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollout_strategy_round_trips() {
        assert_eq!("rollout".parse::<RolloutStrategy>().unwrap(), RolloutStrategy::Rollout);
        assert_eq!("restart".parse::<RolloutStrategy>().unwrap(), RolloutStrategy::Restart);
        assert!("bogus".parse::<RolloutStrategy>().is_err());
    }

    #[test]
    fn reload_strategy_round_trips() {
        assert_eq!("env-vars".parse::<ReloadStrategy>().unwrap(), ReloadStrategy::EnvVars);
        assert_eq!(
            "annotations".parse::<ReloadStrategy>().unwrap(),
            ReloadStrategy::Annotations
        );
        assert!("bogus".parse::<ReloadStrategy>().is_err());
    }

    #[test]
    fn legacy_rollout_token_normalizes_to_env_vars() {
        assert_eq!("rollout".parse::<ReloadStrategy>().unwrap(), ReloadStrategy::EnvVars);
    }

    #[test]
    fn status_key_has_namespace_kind_name_shape() {
        let target = Target {
            kind: WorkloadKind::Deployment,
            name: "web".to_string(),
            namespace: "default".to_string(),
            rollout_strategy: RolloutStrategy::DEFAULT,
            reload_strategy: ReloadStrategy::DEFAULT,
            pause_period: None,
            require_reference: false,
            owner: None,
        };
        assert_eq!(target.status_key(), "default/Deployment/web");
        assert!(target.is_annotation_derived());
    }
}
