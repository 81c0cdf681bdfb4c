use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use candle_core::Device;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::{
    config::ServiceConfig,
    error::{BoxError, EngineError, Result, Stage},
    generation,
    gpu::{resolve_dtype_for, HardwareProfile, Precision},
    moderation::{self, Category},
    types::{GenerationResult, GuardConfig, InferenceConfig, ModerationResult},
};

use super::{
    backend::{CausalLm, LoadRequest, ModelBackend, ModelPair, ModelRole, TokenCodec},
    canned::CannedBackend,
    loader::CandleBackend,
    paths::{ModelPathResolver, ModelSource},
};

lazy_static::lazy_static! {
    static ref SHARED: Arc<ModelManager> = Arc::new(ModelManager::from_env());
}

/// Which model slots are populated. Loading only ever adds capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Uninitialized,
    LlmLoaded,
    GuardLoaded,
    BothLoaded,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ManagerState::Uninitialized => "uninitialized",
            ManagerState::LlmLoaded => "llm_loaded",
            ManagerState::GuardLoaded => "guard_loaded",
            ManagerState::BothLoaded => "both_loaded",
        })
    }
}

/// A resident tokenizer/model pair and the lock serializing its use.
pub struct LoadedModel {
    model_id: String,
    source: ModelSource,
    pair: ModelPair,
    exec_lock: Mutex<()>,
    serialize: bool,
}

impl LoadedModel {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn pair(&self) -> &ModelPair {
        &self.pair
    }

    pub fn tokenizer(&self) -> &dyn TokenCodec {
        self.pair.tokenizer.as_ref()
    }

    pub fn model(&self) -> &dyn CausalLm {
        self.pair.model.as_ref()
    }

    /// Held for the duration of one inference call when serialization is on
    fn exclusive(&self) -> Option<MutexGuard<'_, ()>> {
        self.serialize.then(|| self.exec_lock.lock())
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model_id", &self.model_id)
            .field("source", &self.source)
            .field("serialize", &self.serialize)
            .finish()
    }
}

/// Owns at most one generation model and one guard model.
///
/// Each slot is loaded lazily on first use. Concurrent first requests share a
/// single load; everyone after that gets the cached instance.
pub struct ModelManager {
    config: Arc<ServiceConfig>,
    backend: Arc<dyn ModelBackend>,
    hardware: HardwareProfile,
    device: Device,
    precision: Precision,
    serialize_inference: bool,
    llm: OnceCell<Arc<LoadedModel>>,
    guard: OnceCell<Arc<LoadedModel>>,
}

impl ModelManager {
    pub fn new(config: ServiceConfig, backend: Arc<dyn ModelBackend>) -> Self {
        let detected = HardwareProfile::detect(config.runtime.accelerator);
        let (hardware, device) = match detected.device() {
            Ok(device) => (detected, device),
            Err(e) => {
                tracing::warn!(hardware = %detected, error = %e, "Cannot open device, using CPU");
                (HardwareProfile::cpu(), Device::Cpu)
            }
        };
        let precision = resolve_dtype_for(&hardware);
        let serialize_inference = config
            .runtime
            .serialize_inference
            .unwrap_or_else(|| hardware.is_accelerated());

        tracing::info!(
            backend = backend.name(),
            hardware = %hardware,
            precision = %precision,
            serialize_inference,
            "Model manager initialized"
        );

        Self {
            config: Arc::new(config),
            backend,
            hardware,
            device,
            precision,
            serialize_inference,
            llm: OnceCell::new(),
            guard: OnceCell::new(),
        }
    }

    /// Picks the canned backend when real model loading is disabled
    pub fn from_config(config: ServiceConfig) -> Self {
        let backend: Arc<dyn ModelBackend> = if config.runtime.skip_model_load {
            Arc::new(CannedBackend::new())
        } else {
            Arc::new(CandleBackend::new())
        };
        Self::new(config, backend)
    }

    pub fn from_env() -> Self {
        Self::from_config(ServiceConfig::from_env())
    }

    /// The process-wide instance, built from the environment on first access.
    pub fn shared() -> Arc<ModelManager> {
        SHARED.clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn hardware(&self) -> &HardwareProfile {
        &self.hardware
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn state(&self) -> ManagerState {
        match (self.llm.initialized(), self.guard.initialized()) {
            (false, false) => ManagerState::Uninitialized,
            (true, false) => ManagerState::LlmLoaded,
            (false, true) => ManagerState::GuardLoaded,
            (true, true) => ManagerState::BothLoaded,
        }
    }

    /// Generation model, loading it on first call. `None` uses the configured default.
    pub async fn load_llm(&self, model_id: Option<&str>) -> Result<Arc<LoadedModel>> {
        let model_id = model_id.unwrap_or(&self.config.models.llm_model_id);
        self.load_slot(ModelRole::Generation, model_id).await
    }

    /// Guard model, loading it on first call. `None` uses the configured default.
    pub async fn load_guard(&self, model_id: Option<&str>) -> Result<Arc<LoadedModel>> {
        let model_id = model_id.unwrap_or(&self.config.models.guard_model_id);
        self.load_slot(ModelRole::Guard, model_id).await
    }

    async fn load_slot(&self, role: ModelRole, model_id: &str) -> Result<Arc<LoadedModel>> {
        let slot = match role {
            ModelRole::Generation => &self.llm,
            ModelRole::Guard => &self.guard,
        };

        let loaded = slot
            .get_or_try_init(|| self.load_model(role, model_id.to_string()))
            .await?;

        if loaded.model_id != model_id {
            tracing::warn!(
                role = role.as_str(),
                requested = model_id,
                resident = %loaded.model_id,
                "Requested model differs from the resident one, serving the resident model"
            );
        }
        Ok(loaded.clone())
    }

    async fn load_model(&self, role: ModelRole, model_id: String) -> Result<Arc<LoadedModel>> {
        let source = ModelPathResolver::for_model(&model_id, &self.config.models).resolve(&model_id);
        let request = LoadRequest {
            model_id: model_id.clone(),
            source: source.clone(),
            precision: self.precision,
            device: self.device.clone(),
            flash_attention: self.config.runtime.flash_attention,
        };

        tracing::info!(
            role = role.as_str(),
            model_id = %model_id,
            source = %source,
            backend = self.backend.name(),
            "Loading model"
        );

        let started = Instant::now();
        let backend = self.backend.clone();
        let pair = tokio::task::spawn_blocking(move || backend.load(role, &request))
            .await
            .map_err(|e| {
                EngineError::model_load(&model_id, format!("load task failed: {}", e), None)
            })?
            .map_err(|e: BoxError| {
                tracing::error!(role = role.as_str(), model_id = %model_id, error = %e, "Model load failed");
                EngineError::model_load(&model_id, e.to_string(), Some(e))
            })?;

        tracing::info!(
            role = role.as_str(),
            model_id = %model_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model ready"
        );

        Ok(Arc::new(LoadedModel {
            model_id,
            source,
            pair,
            exec_lock: Mutex::new(()),
            serialize: self.serialize_inference,
        }))
    }

    /// Generate a completion for `prompt`, loading the generation model if needed.
    pub async fn generate(&self, prompt: &str, config: &InferenceConfig) -> Result<GenerationResult> {
        config.validate()?;
        let ceiling = self.config.generation.max_tokens_ceiling;
        if config.max_tokens > ceiling {
            return Err(EngineError::generation(format!(
                "maxTokens {} exceeds the limit of {}",
                config.max_tokens, ceiling
            )));
        }
        if config.stream {
            tracing::debug!("Streaming requested, returning a single response");
        }

        let loaded = self
            .load_llm(Some(&config.model_id))
            .await
            .map_err(|e| EngineError::model_unavailable(Stage::Generation, e))?;

        let limits = self.config.generation.clone();
        let prompt = prompt.to_string();
        let request = config.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _exclusive = loaded.exclusive();
            generation::run(loaded.tokenizer(), loaded.model(), &prompt, &request, &limits)
        })
        .await
        .map_err(|e| EngineError::generation(format!("generation task failed: {}", e)))??;

        tracing::info!(
            model_id = %config.model_id,
            prompt_tokens = result.prompt_tokens,
            completion_tokens = result.completion_tokens,
            latency_ms = result.latency_ms,
            "Generation complete"
        );
        Ok(result)
    }

    /// Classify `text` against the requested categories, loading the guard if needed.
    pub async fn moderate(&self, text: &str, config: &GuardConfig) -> Result<ModerationResult> {
        let categories = Category::select(&config.categories)?;
        config.validate()?;

        let loaded = self
            .load_guard(Some(&config.model_id))
            .await
            .map_err(|e| EngineError::model_unavailable(Stage::Moderation, e))?;

        let text = text.to_string();
        let scores = tokio::task::spawn_blocking(move || {
            let _exclusive = loaded.exclusive();
            categories
                .into_iter()
                .map(|category| {
                    loaded
                        .model()
                        .classify(loaded.tokenizer(), &text, category)
                        .map(|score| (category, score))
                })
                .collect::<std::result::Result<Vec<_>, BoxError>>()
        })
        .await
        .map_err(|e| EngineError::moderation(format!("moderation task failed: {}", e)))?
        .map_err(|e| EngineError::from_backend(Stage::Moderation, "guard classification", e))?;

        let result = moderation::evaluate(&scores, config)?;
        tracing::info!(
            model_id = %config.model_id,
            verdict = %result.verdict,
            severity = %result.severity,
            triggered = result.categories.len(),
            "Moderation complete"
        );
        Ok(result)
    }
}
