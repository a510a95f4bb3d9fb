//! # Configuration
//!
//! - `controller`: process-wide settings loaded from environment variables.

mod controller;

pub use controller::ControllerConfig;
