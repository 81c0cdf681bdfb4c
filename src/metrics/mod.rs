//! Pipeline metrics collection

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};

// Latency samples kept for percentile estimates
pub(crate) const MAX_METRICS_HISTORY: usize = 1000;
