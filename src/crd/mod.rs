//! # Custom Resource Definitions
//!
//! CRD types for the Reloader controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - ReloaderConfig specification and default values
//! - `status.rs` - Status types tracking watched-resource hashes, reload counts, and conditions

mod spec;
mod status;

pub use spec::{
    AlertingConfig, IgnoreResource, IgnoredResourceKind, ReloaderConfig, ReloaderConfigSpec,
    TargetSpec, WatchedResources, WebhookRef, default_false,
};
pub use status::{
    CONDITION_AVAILABLE, CONDITION_DEGRADED, CONDITION_PROGRESSING, Condition,
    REASON_RECONCILED, REASON_RECONCILING, REASON_RELOAD_FAILED, REASON_RELOAD_SUCCEEDED,
    REASON_RESOURCE_NOT_FOUND, REASON_TARGET_NOT_FOUND, ReloaderConfigStatus, TargetStatus,
};
