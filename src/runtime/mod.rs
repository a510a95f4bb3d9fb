//! # Runtime
//!
//! The ambient plumbing that drives the Reconciler Core: startup
//! (`initialization`), the three typed watch loops (`watch_loop`), and
//! watch-stream error classification (`error_policy`). None of this is
//! load-bearing for the spec's invariants — it is the "manager" the core
//! treats as an external collaborator, included because a complete repo
//! needs something driving it.

mod error_policy;
mod initialization;
mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::{run_configmap_watch, run_reloader_config_watch, run_secret_watch};
