use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::Stage;
use crate::types::{PipelineResult, Verdict};

use super::MAX_METRICS_HISTORY;

/// Collects pipeline counters and latency history
pub struct MetricsCollector {
    state: RwLock<MetricsState>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct MetricsState {
    // Run counters
    total_runs: u64,
    generation_failures: u64,
    moderation_failures: u64,

    // Verdict counters
    allowed: u64,
    flagged: u64,
    blocked: u64,

    // Token counters
    prompt_tokens: u64,
    completion_tokens: u64,

    // Latency of successful runs, bounded
    latencies: VecDeque<Duration>,
}

/// A point-in-time copy of the collected metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_runs: u64,
    pub generation_failures: u64,
    pub moderation_failures: u64,
    pub allowed: u64,
    pub flagged: u64,
    pub blocked: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub average_latency_ms: f64,
    pub p95_latency_ms: f64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MetricsState::default()),
            start_time: Instant::now(),
        }
    }

    /// Record a completed pipeline run
    pub fn record_run(&self, result: &PipelineResult, elapsed: Duration) {
        let mut state = self.state.write();

        state.total_runs += 1;
        state.prompt_tokens += result.generation.prompt_tokens as u64;
        state.completion_tokens += result.generation.completion_tokens as u64;
        match result.moderation.verdict {
            Verdict::Allow => state.allowed += 1,
            Verdict::Flag => state.flagged += 1,
            Verdict::Block => state.blocked += 1,
        }

        state.latencies.push_back(elapsed);
        if state.latencies.len() > MAX_METRICS_HISTORY {
            state.latencies.pop_front();
        }
    }

    /// Record a run that failed in `stage`
    pub fn record_failure(&self, stage: Stage) {
        let mut state = self.state.write();
        state.total_runs += 1;
        match stage {
            Stage::Generation => state.generation_failures += 1,
            Stage::Moderation => state.moderation_failures += 1,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read();

        let mut latencies: Vec<Duration> = state.latencies.iter().copied().collect();
        latencies.sort();

        let average_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().map(|d| d.as_secs_f64()).sum::<f64>() * 1000.0
                / latencies.len() as f64
        };
        let p95_idx = ((latencies.len() as f64 * 0.95) as usize).min(latencies.len().saturating_sub(1));
        let p95_latency_ms = latencies
            .get(p95_idx)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or_default();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            total_runs: state.total_runs,
            generation_failures: state.generation_failures,
            moderation_failures: state.moderation_failures,
            allowed: state.allowed,
            flagged: state.flagged,
            blocked: state.blocked,
            prompt_tokens: state.prompt_tokens,
            completion_tokens: state.completion_tokens,
            average_latency_ms,
            p95_latency_ms,
        }
    }
}
