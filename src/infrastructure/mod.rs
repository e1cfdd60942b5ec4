//! Infrastructure - cold path only
//!
//! This module contains code off the data path:
//! - Logging and metrics
//! - Configuration management

pub mod config;
pub mod logging;
pub mod metrics;

pub use metrics::{DeviceMetrics, MetricsSnapshot};
