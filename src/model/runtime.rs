// Location: src/model/runtime.rs

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::llama::{Cache, Config, Llama};

use crate::error::BoxError;

use super::backend::{CausalLm, DecodeSession};

/// A loaded Llama model. Weights are shared read-only; each request gets
/// its own KV cache through [`CausalLm::session`].
pub struct LlamaRuntime {
    model: Llama,
    config: Config,
    device: Device,
    dtype: DType,
}

impl LlamaRuntime {
    pub fn new(model: Llama, config: Config, device: Device, dtype: DType) -> Self {
        Self {
            model,
            config,
            device,
            dtype,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl CausalLm for LlamaRuntime {
    fn session(&self) -> Result<Box<dyn DecodeSession + '_>, BoxError> {
        let cache = Cache::new(true, self.dtype, &self.config, &self.device)?;
        Ok(Box::new(LlamaSession {
            runtime: self,
            cache,
        }))
    }
}

struct LlamaSession<'a> {
    runtime: &'a LlamaRuntime,
    cache: Cache,
}

impl DecodeSession for LlamaSession<'_> {
    fn step(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor, BoxError> {
        let input = Tensor::new(tokens, &self.runtime.device)?.unsqueeze(0)?;
        let logits = self.runtime.model.forward(&input, index_pos, &mut self.cache)?;
        Ok(logits.squeeze(0)?.to_dtype(DType::F32)?)
    }
}
