//! Capability interface between the manager and a concrete model runtime

use std::fmt;
use std::sync::Arc;

use candle_core::{Device, Tensor};

use crate::error::BoxError;
use crate::gpu::Precision;
use crate::moderation::{guard, Category};

use super::paths::ModelSource;

/// Which slot of the manager a model is loaded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Generation,
    Guard,
}

impl ModelRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelRole::Generation => "llm",
            ModelRole::Guard => "guard",
        }
    }
}

/// Everything a backend needs to materialize one model.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub model_id: String,
    pub source: ModelSource,
    pub precision: Precision,
    pub device: Device,
    pub flash_attention: bool,
}

/// Loads tokenizer and model artifacts.
///
/// Loading is blocking work; the manager runs it off the async executor.
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, role: ModelRole, request: &LoadRequest) -> Result<ModelPair, BoxError>;
}

/// A loaded tokenizer together with its model
#[derive(Clone)]
pub struct ModelPair {
    pub tokenizer: Arc<dyn TokenCodec>,
    pub model: Arc<dyn CausalLm>,
}

impl fmt::Debug for ModelPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPair")
            .field("eos_token_ids", &self.tokenizer.eos_token_ids())
            .field("pad_token_id", &self.tokenizer.pad_token_id())
            .finish_non_exhaustive()
    }
}

pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, BoxError>;

    /// Decode ids to text, dropping special tokens
    fn decode(&self, ids: &[u32]) -> Result<String, BoxError>;

    fn eos_token_ids(&self) -> &[u32];

    fn pad_token_id(&self) -> u32;
}

/// Incremental decoding state (the KV cache) for one request.
pub trait DecodeSession {
    /// Feed `tokens` starting at `index_pos` and return next-token logits as
    /// a rank-1 f32 tensor over the vocabulary.
    fn step(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor, BoxError>;
}

pub trait CausalLm: Send + Sync {
    fn session(&self) -> Result<Box<dyn DecodeSession + '_>, BoxError>;

    /// Probability in [0, 1] that `text` violates `category`.
    ///
    /// The default asks the model for a Llama Guard style safe/unsafe verdict.
    fn classify(
        &self,
        tokenizer: &dyn TokenCodec,
        text: &str,
        category: Category,
    ) -> Result<f32, BoxError> {
        guard::unsafe_probability(self, tokenizer, text, category)
    }
}

/// First candidate pad id, falling back to the end-of-sequence token.
pub(crate) fn resolve_pad_token<I>(candidates: I, eos_token_id: u32) -> u32
where
    I: IntoIterator<Item = Option<u32>>,
{
    candidates.into_iter().flatten().next().unwrap_or(eos_token_id)
}
