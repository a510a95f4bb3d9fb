//! # Observability
//!
//! - `metrics`: Prometheus metrics collection, served over `/metrics` by `crate::server`.

pub mod metrics;
