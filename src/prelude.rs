//! # Prelude
//!
//! Re-exports commonly used types for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use reloader_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (`ReloaderConfig`, `TargetSpec`, `Condition`, etc.)
//! - Reconciler types (`Reconciler`, `ReconcilerError`)
//! - Config types (`ControllerConfig`)
//! - The materialized `Target`, `RolloutStrategy`, `ReloadStrategy`
//! - The polymorphic `Workload` trait and `WorkloadKind`

// CRD types - most commonly used
pub use crate::crd::*;

// Reconciler types - core controller functionality
pub use crate::controller::{Reconciler, ReconcilerError};

// Config types - for configuration management
pub use crate::config::ControllerConfig;

// Materialized targets and strategies
pub use crate::target::{ReloadStrategy, RolloutStrategy, Target};

// Workload abstraction
pub use crate::workload::{Workload, WorkloadKind};

// Common error types from the algorithmic core
pub use crate::finder::FinderError;
pub use crate::updater::UpdaterError;
