//! Autoregressive decoding over a loaded [`CausalLm`]

mod sampler;
mod stop;

pub use sampler::{apply_occurrence_penalties, sampling_strategy, TokenSampler};
pub use stop::StopSequences;

use std::time::Instant;

use crate::config::GenerationLimits;
use crate::error::{BoxError, EngineError, Result, Stage};
use crate::model::{CausalLm, TokenCodec};
use crate::types::{FinishReason, GenerationResult, InferenceConfig};

/// Run one generation request to completion.
///
/// Decoding stops at an end-of-sequence token, at the first stop sequence in
/// the decoded text, or after `maxTokens` samples. Exceeding the configured
/// wall-clock budget is an error.
pub fn run(
    tokenizer: &dyn TokenCodec,
    model: &dyn CausalLm,
    prompt: &str,
    config: &InferenceConfig,
    limits: &GenerationLimits,
) -> Result<GenerationResult> {
    let started = Instant::now();
    let deadline = started + limits.timeout;

    let prompt_ids = tokenizer.encode(prompt, true).map_err(backend("tokenize prompt"))?;
    if prompt_ids.is_empty() {
        return Err(EngineError::generation("prompt produced no tokens"));
    }
    let prompt_tokens = prompt_ids.len();

    let eos = tokenizer.eos_token_ids();
    let stops = StopSequences::new(&config.stop_sequences);
    let mut sampler = TokenSampler::new(config, limits.seed, limits.repetition_context_size);
    let mut session = model.session().map_err(backend("create decode session"))?;

    let mut tokens = prompt_ids;
    let mut generated: Vec<u32> = Vec::with_capacity(config.max_tokens.min(1024));
    let mut index_pos = 0;
    let mut finish_reason = FinishReason::Length;
    let mut completion = None;

    for step in 0..config.max_tokens {
        if Instant::now() >= deadline {
            return Err(EngineError::generation(format!(
                "decoding exceeded the {}s time budget after {} tokens",
                limits.timeout.as_secs(),
                generated.len()
            )));
        }

        let fed = if step == 0 { tokens.len() } else { 1 };
        let input = &tokens[tokens.len() - fed..];
        let logits = session.step(input, index_pos).map_err(backend("forward pass"))?;
        index_pos += fed;

        let next = sampler
            .sample(&logits, &tokens, &generated)
            .map_err(|e| backend("sampling")(e.into()))?;
        tokens.push(next);
        generated.push(next);

        if eos.contains(&next) {
            finish_reason = FinishReason::Eos;
            break;
        }

        if !stops.is_empty() {
            let text = tokenizer.decode(&generated).map_err(backend("decode"))?;
            if let Some(kept) = stops.truncate(&text) {
                completion = Some(kept.to_string());
                finish_reason = FinishReason::Stop;
                break;
            }
        }
    }

    let completion = match completion {
        Some(text) => text,
        None => {
            let content: Vec<u32> = generated
                .iter()
                .copied()
                .filter(|id| !eos.contains(id))
                .collect();
            tokenizer.decode(&content).map_err(backend("decode"))?
        }
    };

    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(
        prompt_tokens,
        completion_tokens = generated.len(),
        latency_ms,
        finish_reason = ?finish_reason,
        "Decoding finished"
    );

    Ok(GenerationResult {
        completion: completion.trim().to_string(),
        prompt_tokens,
        completion_tokens: generated.len(),
        latency_ms,
        finish_reason,
    })
}

fn backend(context: &'static str) -> impl FnOnce(BoxError) -> EngineError {
    move |e| EngineError::from_backend(Stage::Generation, context, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use candle_core::Device;
    use pretty_assertions::assert_eq;

    use crate::gpu::Precision;
    use crate::model::{CannedBackend, LoadRequest, ModelBackend, ModelPair, ModelRole, ModelSource};

    fn canned(completion: &str) -> ModelPair {
        let request = LoadRequest {
            model_id: "test/model".to_string(),
            source: ModelSource::Hub("test/model".to_string()),
            precision: Precision::F32,
            device: Device::Cpu,
            flash_attention: false,
        };
        CannedBackend::new()
            .with_completion(completion)
            .load(ModelRole::Generation, &request)
            .unwrap()
    }

    fn generate(pair: &ModelPair, config: &InferenceConfig) -> Result<GenerationResult> {
        run(
            pair.tokenizer.as_ref(),
            pair.model.as_ref(),
            "测试提示",
            config,
            &GenerationLimits::default(),
        )
    }

    #[test]
    fn test_runs_to_eos() {
        let pair = canned("Mocked output text");
        let result = generate(&pair, &InferenceConfig::new("test/model")).unwrap();

        assert_eq!(result.completion, "Mocked output text");
        assert_eq!(result.prompt_tokens, 2);
        assert_eq!(result.completion_tokens, 4);
        assert_eq!(result.finish_reason, FinishReason::Eos);
        assert!(result.latency_ms >= 0.0);
    }

    #[test]
    fn test_stop_sequence_truncates() {
        let pair = canned("Mocked output text");
        let mut config = InferenceConfig::new("test/model");
        config.stop_sequences = vec!["output".to_string()];

        let result = generate(&pair, &config).unwrap();
        assert_eq!(result.completion, "Mocked");
        assert_eq!(result.completion_tokens, 2);
        assert_eq!(result.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_max_tokens_bounds_decoding() {
        let pair = canned("one two three four five");
        let mut config = InferenceConfig::new("test/model");
        config.max_tokens = 2;

        let result = generate(&pair, &config).unwrap();
        assert_eq!(result.completion, "one two");
        assert_eq!(result.completion_tokens, 2);
        assert_eq!(result.finish_reason, FinishReason::Length);
    }

    #[test]
    fn test_time_budget() {
        let pair = canned("Mocked output text");
        let limits = GenerationLimits {
            timeout: Duration::ZERO,
            ..GenerationLimits::default()
        };

        let error = run(
            pair.tokenizer.as_ref(),
            pair.model.as_ref(),
            "hello",
            &InferenceConfig::new("test/model"),
            &limits,
        )
        .unwrap_err();
        assert!(matches!(error, EngineError::Generation { .. }));
        assert!(error.to_string().contains("time budget"));
    }
}
