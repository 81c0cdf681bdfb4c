use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_nn::VarBuilder;
use candle_transformers::models::llama::{Llama, LlamaConfig, LlamaEosToks};

use crate::error::BoxError;

use super::backend::{LoadRequest, ModelBackend, ModelPair, ModelRole};
use super::paths::ModelSource;
use super::runtime::LlamaRuntime;
use super::tokenizer::HfTokenCodec;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Loads Llama-architecture checkpoints (generation and Llama Guard) with candle.
#[derive(Debug, Default)]
pub struct CandleBackend;

impl CandleBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ModelBackend for CandleBackend {
    fn name(&self) -> &'static str {
        "candle"
    }

    fn load(&self, role: ModelRole, request: &LoadRequest) -> Result<ModelPair, BoxError> {
        let started = Instant::now();
        let files = ModelFiles::locate(&request.source)?;

        let raw_config = std::fs::read(&files.config)?;
        let llama_config: LlamaConfig = serde_json::from_slice(&raw_config)
            .map_err(|e| format!("invalid {}: {}", files.config.display(), e))?;
        let config = llama_config.into_config(request.flash_attention);

        let config_eos = match &config.eos_token_id {
            Some(LlamaEosToks::Single(id)) => vec![*id],
            Some(LlamaEosToks::Multiple(ids)) => ids.clone(),
            None => Vec::new(),
        };
        let tokenizer = HfTokenCodec::from_file(&files.tokenizer, config_eos)?;

        let dtype = request.precision.dtype();
        // SAFETY: the weight files are treated as immutable for the process lifetime.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, dtype, &request.device)? };
        let model = Llama::load(vb, &config)?;

        tracing::info!(
            role = role.as_str(),
            model_id = %request.model_id,
            source = %request.source,
            shards = files.weights.len(),
            vocab_size = tokenizer.vocab_size(),
            precision = %request.precision,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model weights loaded"
        );

        Ok(ModelPair {
            tokenizer: Arc::new(tokenizer),
            model: Arc::new(LlamaRuntime::new(model, config, request.device.clone(), dtype)),
        })
    }
}

/// Concrete artifact files for one checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

impl ModelFiles {
    pub fn locate(source: &ModelSource) -> Result<Self, BoxError> {
        match source {
            ModelSource::Local(dir) => Self::from_dir(dir),
            ModelSource::Hub(model_id) => Self::from_hub(model_id),
        }
    }

    /// Files from a local checkout. Sharded checkpoints are read through their
    /// index; otherwise every `*.safetensors` file in the directory is used.
    pub fn from_dir(dir: &Path) -> Result<Self, BoxError> {
        let config = required_file(dir, CONFIG_FILE)?;
        let tokenizer = required_file(dir, TOKENIZER_FILE)?;

        let index = dir.join(WEIGHTS_INDEX_FILE);
        let weights = if index.is_file() {
            shard_names(&index)?
                .into_iter()
                .map(|name| required_file(dir, &name))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().map_or(false, |ext| ext == "safetensors"))
                .collect();
            found.sort();
            found
        };

        if weights.is_empty() {
            return Err(format!("no safetensors weights found in {}", dir.display()).into());
        }

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    /// Files fetched through the Hugging Face hub cache
    pub fn from_hub(model_id: &str) -> Result<Self, BoxError> {
        tracing::info!(model_id, "Fetching model files from the hub");
        let api = hf_hub::api::sync::Api::new()?;
        let repo = api.model(model_id.to_string());

        let config = repo.get(CONFIG_FILE)?;
        let tokenizer = repo.get(TOKENIZER_FILE)?;
        let weights = match repo.get(WEIGHTS_INDEX_FILE) {
            Ok(index) => shard_names(&index)?
                .iter()
                .map(|name| repo.get(name))
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => vec![repo.get(WEIGHTS_FILE)?],
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }
}

fn required_file(dir: &Path, name: &str) -> Result<PathBuf, BoxError> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("{} not found in {}", name, dir.display()).into())
    }
}

/// Unique shard file names listed in a safetensors index, sorted
fn shard_names(index: &Path) -> Result<Vec<String>, BoxError> {
    let raw = std::fs::read(index)?;
    let json: serde_json::Value = serde_json::from_slice(&raw)?;
    let weight_map = json
        .get("weight_map")
        .and_then(|v| v.as_object())
        .ok_or_else(|| format!("{} has no weight_map", index.display()))?;

    let names: BTreeSet<String> = weight_map
        .values()
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect();
    Ok(names.into_iter().collect())
}
