use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::{Result, Stage},
    metrics::MetricsCollector,
    types::{GuardConfig, InferenceConfig, PipelineResult, Verdict},
};

use super::InferenceService;

/// Text returned in place of a blocked completion
pub const BLOCKED_PLACEHOLDER: &str = "[Content blocked by safety policy]";

/// Generate, then moderate the completion, then apply the block policy.
pub struct Pipeline {
    service: Arc<dyn InferenceService>,
    metrics: Arc<MetricsCollector>,
}

impl Pipeline {
    pub fn new(service: Arc<dyn InferenceService>, metrics: Arc<MetricsCollector>) -> Self {
        Self { service, metrics }
    }

    /// Run both stages in order. A generation failure aborts the run before
    /// moderation; no partial result is returned.
    #[tracing::instrument(skip_all, fields(llm = %inference.model_id, guard = %guard.model_id))]
    pub async fn run_pipeline(
        &self,
        prompt: &str,
        inference: &InferenceConfig,
        guard: &GuardConfig,
    ) -> Result<PipelineResult> {
        let started = Instant::now();

        let generation = match self.service.generate(prompt, inference).await {
            Ok(generation) => generation,
            Err(e) => {
                self.metrics.record_failure(Stage::Generation);
                tracing::warn!(error = %e, "Generation stage failed");
                return Err(e);
            }
        };

        let moderation = match self.service.moderate(&generation.completion, guard).await {
            Ok(moderation) => moderation,
            Err(e) => {
                self.metrics.record_failure(Stage::Moderation);
                tracing::warn!(error = %e, "Moderation stage failed");
                return Err(e);
            }
        };

        let blocked = moderation.verdict == Verdict::Block;
        let output = if blocked {
            tracing::debug!(
                raw_completion = %generation.completion,
                categories = ?moderation.categories,
                "Completion withheld by safety policy"
            );
            BLOCKED_PLACEHOLDER.to_string()
        } else {
            generation.completion.clone()
        };

        let result = PipelineResult {
            generation,
            moderation,
            output,
            blocked,
        };
        self.metrics.record_run(&result, started.elapsed());

        tracing::info!(
            verdict = %result.moderation.verdict,
            blocked,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );
        Ok(result)
    }
}
