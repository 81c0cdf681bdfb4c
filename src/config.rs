// Location: src/config.rs

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const DEFAULT_LLM_MODEL_ID: &str = "meta-llama/Llama-3.2-3B-Instruct";
pub const DEFAULT_GUARD_MODEL_ID: &str = "meta-llama/Llama-Guard-3-1B";
pub const DEFAULT_CONTAINER_MODEL_DIR: &str = "/models";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub models: ModelConfig,
    pub runtime: RuntimeConfig,
    pub generation: GenerationLimits,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Generation model used when a request does not name one
    pub llm_model_id: String,

    /// Guard model used when a request does not name one
    pub guard_model_id: String,

    /// Developer checkout of model weights, searched first
    pub local_dir: Option<PathBuf>,

    /// Volume mounted into the serving container
    pub container_dir: Option<PathBuf>,

    /// Shared workspace directory, searched last before the hub
    pub workspace_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Serve canned outputs instead of loading real weights (CI and tests)
    pub skip_model_load: bool,

    /// Force (`Some(true)`) or forbid (`Some(false)`) accelerator use.
    /// `None` means auto-detect.
    pub accelerator: Option<bool>,

    /// Whether to use flash attention when the model supports it
    pub flash_attention: bool,

    /// Serialize inference calls per model. `None` picks a default from the device.
    pub serialize_inference: Option<bool>,

    /// Load both models at startup instead of on first request
    pub preload_models: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationLimits {
    /// Hard ceiling on `maxTokens` accepted by a single request
    pub max_tokens_ceiling: usize,

    /// Wall-clock budget for one decoding run
    pub timeout: Duration,

    /// Seed for the sampling RNG
    pub seed: u64,

    /// How many trailing context tokens the repetition penalty looks at
    pub repetition_context_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            llm_model_id: DEFAULT_LLM_MODEL_ID.to_string(),
            guard_model_id: DEFAULT_GUARD_MODEL_ID.to_string(),
            local_dir: None,
            container_dir: Some(PathBuf::from(DEFAULT_CONTAINER_MODEL_DIR)),
            workspace_dir: None,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            skip_model_load: false,
            accelerator: None,
            flash_attention: false,
            serialize_inference: None,
            preload_models: false,
        }
    }
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            max_tokens_ceiling: 4096,
            timeout: Duration::from_secs(120),
            seed: 299792458,
            repetition_context_size: 256,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Builds the configuration from process environment variables.
    ///
    /// If `NEUROBREAK_CONFIG` names a JSON file it is loaded first and the
    /// remaining variables are layered on top.
    pub fn from_env() -> Self {
        let base = match std::env::var("NEUROBREAK_CONFIG") {
            Ok(path) => match Self::from_json_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Ignoring unreadable config file");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Loads a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::configuration("config_file", format!("{}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::configuration("config_file", e.to_string()))
    }

    /// Applies environment-style overrides from `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("SKIP_MODEL_LOAD") {
            self.runtime.skip_model_load = parse_flag("SKIP_MODEL_LOAD", &v).unwrap_or(false);
        }
        if let Some(v) = non_empty("PRELOAD_MODELS") {
            self.runtime.preload_models = parse_flag("PRELOAD_MODELS", &v).unwrap_or(false);
        }
        if let Some(v) = non_empty("CUDA_AVAILABLE") {
            self.runtime.accelerator = parse_flag("CUDA_AVAILABLE", &v);
        }
        if let Some(v) = non_empty("LLM_MODEL_ID") {
            self.models.llm_model_id = v;
        }
        if let Some(v) = non_empty("GUARD_MODEL_ID") {
            self.models.guard_model_id = v;
        }
        if let Some(v) = non_empty("LOCAL_MODEL_DIR") {
            self.models.local_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("CONTAINER_MODEL_DIR") {
            self.models.container_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("WORKSPACE_MODEL_DIR") {
            self.models.workspace_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("MAX_TOKENS_CEILING") {
            if let Some(n) = parse_number::<usize>("MAX_TOKENS_CEILING", &v) {
                self.generation.max_tokens_ceiling = n;
            }
        }
        if let Some(v) = non_empty("GENERATION_TIMEOUT_SECS") {
            if let Some(n) = parse_number::<u64>("GENERATION_TIMEOUT_SECS", &v) {
                self.generation.timeout = Duration::from_secs(n);
            }
        }
        if let Some(v) = non_empty("GENERATION_SEED") {
            if let Some(n) = parse_number::<u64>("GENERATION_SEED", &v) {
                self.generation.seed = n;
            }
        }
        if let Some(v) = non_empty("NEUROBREAK_BIND") {
            self.server.bind_addr = v;
        }

        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.llm_model_id.trim().is_empty() {
            return Err(EngineError::configuration(
                "llm_model_id",
                "Model id cannot be empty",
            ));
        }

        if self.models.guard_model_id.trim().is_empty() {
            return Err(EngineError::configuration(
                "guard_model_id",
                "Model id cannot be empty",
            ));
        }

        if self.generation.max_tokens_ceiling == 0 {
            return Err(EngineError::configuration(
                "max_tokens_ceiling",
                "Token ceiling must be positive",
            ));
        }

        if self.generation.timeout.is_zero() {
            return Err(EngineError::configuration(
                "timeout",
                "Generation time budget must be positive",
            ));
        }

        self.bind_addr()?;

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .map_err(|e| EngineError::configuration("bind_addr", format!("{}", e)))
    }
}

fn parse_flag(key: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(key, value = other, "Unrecognised boolean flag, using default");
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value, "Unparseable number, using default");
            None
        }
    }
}
