//! # Controller
//!
//! The Reconciler Core (spec §4.4): create/update/delete handling for
//! watched Secrets/ConfigMaps and validation of `ReloaderConfig` itself.

mod reconciler;

pub use reconciler::{Reconciler, ReconcilerError};

pub(crate) use reconciler::{
    reconcile_configmap_applied, reconcile_configmap_deleted, reconcile_reloader_config,
    reconcile_secret_applied, reconcile_secret_deleted,
};
