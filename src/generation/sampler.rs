// Location: src/generation/sampler.rs

use std::collections::HashMap;

use candle_core::{Result, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};

use crate::types::InferenceConfig;

/// Sampling strategy for the request's temperature / top-k / top-p.
///
/// A zero temperature or zero top-p degenerates to greedy decoding; top-p of
/// 1.0 and top-k of 0 disable the respective filter.
pub fn sampling_strategy(temperature: f64, top_k: usize, top_p: f64) -> Sampling {
    if temperature <= 0.0 || top_p <= 0.0 {
        return Sampling::ArgMax;
    }

    let nucleus = top_p < 1.0;
    match (top_k > 0, nucleus) {
        (true, true) => Sampling::TopKThenTopP {
            k: top_k,
            p: top_p,
            temperature,
        },
        (true, false) => Sampling::TopK { k: top_k, temperature },
        (false, true) => Sampling::TopP { p: top_p, temperature },
        (false, false) => Sampling::All { temperature },
    }
}

/// Picks the next token, applying the request's penalties first.
pub struct TokenSampler {
    processor: LogitsProcessor,
    repetition_penalty: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
    repetition_context: usize,
}

impl TokenSampler {
    pub fn new(config: &InferenceConfig, seed: u64, repetition_context: usize) -> Self {
        let sampling = sampling_strategy(config.temperature, config.top_k, config.top_p);
        Self {
            processor: LogitsProcessor::from_sampling(seed, sampling),
            repetition_penalty: config.repetition_penalty,
            presence_penalty: config.presence_penalty,
            frequency_penalty: config.frequency_penalty,
            repetition_context,
        }
    }

    /// `context` is the whole sequence so far (prompt included); `generated`
    /// only the sampled tokens.
    pub fn sample(&mut self, logits: &Tensor, context: &[u32], generated: &[u32]) -> Result<u32> {
        let mut logits = logits.clone();

        if self.repetition_penalty != 1.0 {
            let start = context.len().saturating_sub(self.repetition_context);
            logits = candle_transformers::utils::apply_repeat_penalty(
                &logits,
                self.repetition_penalty,
                &context[start..],
            )?;
        }

        if self.presence_penalty != 0.0 || self.frequency_penalty != 0.0 {
            logits = apply_occurrence_penalties(
                &logits,
                generated,
                self.presence_penalty,
                self.frequency_penalty,
            )?;
        }

        self.processor.sample(&logits)
    }
}

/// Subtract `presence + frequency * count` from every token already generated.
pub fn apply_occurrence_penalties(
    logits: &Tensor,
    generated: &[u32],
    presence: f32,
    frequency: f32,
) -> Result<Tensor> {
    if generated.is_empty() {
        return Ok(logits.clone());
    }

    let mut counts: HashMap<u32, usize> = HashMap::new();
    for &id in generated {
        *counts.entry(id).or_default() += 1;
    }

    let mut values = logits.to_vec1::<f32>()?;
    for (id, count) in counts {
        if let Some(v) = values.get_mut(id as usize) {
            *v -= presence + frequency * count as f32;
        }
    }

    let len = values.len();
    Tensor::from_vec(values, len, logits.device())
}
