//! Common type definitions shared by the manager, the pipeline and the transport

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::moderation::Category;

/// Sampling and decoding controls for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    pub model_id: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: usize,
    pub max_tokens: usize,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
    #[serde(default)]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Accepted for compatibility; results are always returned in one response.
    #[serde(default)]
    pub stream: bool,
}

fn default_repetition_penalty() -> f32 {
    1.0
}

impl InferenceConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            temperature: 0.7,
            top_p: 0.9,
            top_k: 50,
            max_tokens: 512,
            repetition_penalty: 1.1,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            stop_sequences: Vec::new(),
            stream: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(EngineError::validation("inferenceConfig.modelId", "must not be empty"));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(EngineError::validation(
                "inferenceConfig.temperature",
                "must be a finite number >= 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(EngineError::validation(
                "inferenceConfig.topP",
                "must be between 0 and 1",
            ));
        }
        if self.max_tokens == 0 {
            return Err(EngineError::validation(
                "inferenceConfig.maxTokens",
                "must be a positive integer",
            ));
        }
        if !self.repetition_penalty.is_finite() || self.repetition_penalty <= 0.0 {
            return Err(EngineError::validation(
                "inferenceConfig.repetitionPenalty",
                "must be a finite number > 0",
            ));
        }
        if !self.presence_penalty.is_finite() || !self.frequency_penalty.is_finite() {
            return Err(EngineError::validation(
                "inferenceConfig.presencePenalty",
                "penalties must be finite numbers",
            ));
        }
        if self.stop_sequences.iter().any(|s| s.is_empty()) {
            return Err(EngineError::validation(
                "inferenceConfig.stopSequences",
                "stop sequences must not be empty strings",
            ));
        }
        Ok(())
    }
}

/// Moderation controls for one guard request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    pub model_id: String,
    pub threshold: f32,
    #[serde(default)]
    pub auto_block: bool,
    /// Category names to evaluate; empty means every supported category.
    #[serde(default)]
    pub categories: BTreeSet<String>,
}

impl GuardConfig {
    pub fn new(model_id: impl Into<String>, threshold: f32) -> Self {
        Self {
            model_id: model_id.into(),
            threshold,
            auto_block: false,
            categories: BTreeSet::new(),
        }
    }

    pub fn with_auto_block(mut self, auto_block: bool) -> Self {
        self.auto_block = auto_block;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(EngineError::validation("guardConfig.modelId", "must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(EngineError::validation(
                "guardConfig.threshold",
                "must be between 0 and 1",
            ));
        }
        if let Some(unknown) = self.categories.iter().find(|c| Category::parse(c).is_none()) {
            return Err(EngineError::validation(
                "guardConfig.categories",
                format!("unknown category '{}'", unknown),
            ));
        }
        Ok(())
    }
}

/// Why decoding stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model emitted an end-of-sequence token
    Eos,
    /// A stop sequence appeared in the decoded output
    Stop,
    /// `maxTokens` was reached
    Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub completion: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub latency_ms: f64,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Flag,
    Block,
}

/// Ordered so that `max()` yields the most severe level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Allow => "allow",
            Verdict::Flag => "flag",
            Verdict::Block => "block",
        })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub verdict: Verdict,
    pub severity: Severity,
    pub rationale: Vec<String>,
    /// Triggered category names, in taxonomy order
    pub categories: Vec<String>,
}

/// Outcome of one generate-then-moderate cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub generation: GenerationResult,
    pub moderation: ModerationResult,
    /// What the caller gets to see: the completion, or the block placeholder
    pub output: String,
    pub blocked: bool,
}

impl PipelineResult {
    /// The unmodified completion, kept for logging even when blocked
    pub fn raw_completion(&self) -> &str {
        &self.generation.completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_inference_config_wire_format() {
        let config: InferenceConfig = serde_json::from_value(serde_json::json!({
            "modelId": "meta-llama/Llama-3.2-3B-Instruct",
            "temperature": 0.7,
            "topP": 0.9,
            "topK": 50,
            "maxTokens": 512,
        }))
        .unwrap();

        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.repetition_penalty, 1.0);
        assert!(config.stop_sequences.is_empty());
        assert!(!config.stream);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inference_config_missing_field() {
        let result = serde_json::from_value::<InferenceConfig>(serde_json::json!({
            "modelId": "m",
            "temperature": 0.7,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_inference_config_validation() {
        let mut config = InferenceConfig::new("m");
        config.top_p = 1.5;
        assert_err!(config.validate());

        let mut config = InferenceConfig::new("m");
        config.max_tokens = 0;
        assert_err!(config.validate());

        let mut config = InferenceConfig::new("m");
        config.stop_sequences = vec![String::new()];
        assert_err!(config.validate());
    }

    #[test]
    fn test_guard_config_validation() {
        assert_ok!(GuardConfig::new("g", 0.5).validate());
        assert_err!(GuardConfig::new("g", 1.2).validate());
        assert!(GuardConfig::new("g", 0.5)
            .with_categories(["violence", "hate"])
            .validate()
            .is_ok());

        let error = GuardConfig::new("g", 0.5)
            .with_categories(["spam"])
            .validate()
            .unwrap_err();
        assert!(error.to_string().contains("spam"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::default(), Severity::Low);
        assert_eq!(
            serde_json::to_string(&Verdict::Block).unwrap(),
            "\"block\""
        );
    }
}
