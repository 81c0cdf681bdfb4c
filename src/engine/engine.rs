use std::sync::Arc;

use serde::Serialize;

use crate::{
    config::ServiceConfig,
    error::Result,
    gpu::Precision,
    metrics::{MetricsCollector, MetricsSnapshot},
    model::{ManagerState, ModelManager},
    types::{GuardConfig, InferenceConfig, ModerationResult, PipelineResult},
};

use super::{builder::EngineBuilder, pipeline::Pipeline};

/// Main entry point: the shared model manager plus the pipeline over it
pub struct Engine {
    pub(super) manager: Arc<ModelManager>,
    pub(super) pipeline: Pipeline,
    pub(super) metrics: Arc<MetricsCollector>,
}

/// Static and runtime facts about the engine, reported on health checks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    pub backend: &'static str,
    pub hardware: String,
    pub precision: Precision,
    pub state: ManagerState,
    pub llm_model_id: String,
    pub guard_model_id: String,
}

impl Engine {
    /// Create a new engine builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &ServiceConfig {
        self.manager.config()
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn info(&self) -> EngineInfo {
        let config = self.manager.config();
        EngineInfo {
            backend: self.manager.backend_name(),
            hardware: self.manager.hardware().to_string(),
            precision: self.manager.precision(),
            state: self.manager.state(),
            llm_model_id: config.models.llm_model_id.clone(),
            guard_model_id: config.models.guard_model_id.clone(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn run_pipeline(
        &self,
        prompt: &str,
        inference: &InferenceConfig,
        guard: &GuardConfig,
    ) -> Result<PipelineResult> {
        self.pipeline.run_pipeline(prompt, inference, guard).await
    }

    pub async fn moderate(&self, text: &str, guard: &GuardConfig) -> Result<ModerationResult> {
        self.manager.moderate(text, guard).await
    }

    /// Load the default generation and guard models now
    pub async fn preload(&self) -> Result<()> {
        self.manager.load_llm(None).await?;
        self.manager.load_guard(None).await?;
        Ok(())
    }
}
