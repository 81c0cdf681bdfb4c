//! Engine module wiring the model manager into the generate-then-moderate pipeline

mod builder;
mod engine;
mod pipeline;

pub use builder::EngineBuilder;
pub use engine::{Engine, EngineInfo};
pub use pipeline::{Pipeline, BLOCKED_PLACEHOLDER};

use crate::{
    error::Result,
    model::ModelManager,
    types::{GenerationResult, GuardConfig, InferenceConfig, ModerationResult},
};

/// The two core operations the pipeline and the transport depend on
#[async_trait::async_trait]
pub trait InferenceService: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, config: &InferenceConfig) -> Result<GenerationResult>;

    /// Classify `text` against the guard policy
    async fn moderate(&self, text: &str, config: &GuardConfig) -> Result<ModerationResult>;
}

#[async_trait::async_trait]
impl InferenceService for ModelManager {
    async fn generate(&self, prompt: &str, config: &InferenceConfig) -> Result<GenerationResult> {
        ModelManager::generate(self, prompt, config).await
    }

    async fn moderate(&self, text: &str, config: &GuardConfig) -> Result<ModerationResult> {
        ModelManager::moderate(self, text, config).await
    }
}
