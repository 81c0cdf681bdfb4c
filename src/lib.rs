//! NeuroBreak engine - LLM generation with guard-model moderation
//!
//! This crate loads a causal language model and a Llama Guard style safety
//! model with candle, runs sampled generation, scores the completion against
//! hazard categories and serves the generate-then-moderate pipeline over HTTP.

// Public modules
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod gpu;
pub mod metrics;
pub mod model;
pub mod moderation;
pub mod server;
pub mod types;
pub mod utils;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported by the root endpoint
pub const SERVICE_NAME: &str = "NeuroBreak API";

// Re-exports for public API
pub use config::ServiceConfig;
pub use engine::{Engine, EngineBuilder, InferenceService, Pipeline};
pub use error::{EngineError, ErrorExt, Result};
pub use gpu::{resolve_dtype, Precision};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use model::{get_model_path, ModelManager, ModelSource};
pub use types::{
    GenerationResult, GuardConfig, InferenceConfig, ModerationResult, PipelineResult, Severity,
    Verdict,
};
