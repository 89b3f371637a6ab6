//! Statistics for the stream registry

pub mod metrics;

pub use metrics::{RegistryMetrics, RegistryStats};
