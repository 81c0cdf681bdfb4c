//! Request and response bodies for the HTTP API

use std::collections::BTreeSet;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    engine::EngineInfo,
    error::{EngineError, ErrorExt},
    metrics::MetricsSnapshot,
    types::{FinishReason, GuardConfig, InferenceConfig, PipelineResult, Severity, Verdict},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    pub prompt: String,
    pub inference_config: InferenceConfig,
    pub guard_config: GuardConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRequest {
    pub text: String,
    pub threshold: f32,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub auto_block: bool,
    /// Guard model to use; the configured default when absent
    #[serde(default)]
    pub model_id: Option<String>,
}

impl ModerationRequest {
    pub fn guard_config(&self, default_model_id: &str) -> GuardConfig {
        GuardConfig {
            model_id: self
                .model_id
                .clone()
                .unwrap_or_else(|| default_model_id.to_string()),
            threshold: self.threshold,
            auto_block: self.auto_block,
            categories: self.categories.clone(),
        }
    }
}

/// Pipeline outcome. `completion` is the placeholder when the run was blocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    pub completion: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub latency_ms: f64,
    pub finish_reason: FinishReason,
    pub verdict: Verdict,
    pub severity: Severity,
    pub rationale: Vec<String>,
    pub categories: Vec<String>,
    pub blocked: bool,
}

impl From<PipelineResult> for PipelineResponse {
    fn from(result: PipelineResult) -> Self {
        Self {
            completion: result.output,
            prompt_tokens: result.generation.prompt_tokens,
            completion_tokens: result.generation.completion_tokens,
            latency_ms: result.generation.latency_ms,
            finish_reason: result.generation.finish_reason,
            verdict: result.moderation.verdict,
            severity: result.moderation.severity,
            rationale: result.moderation.rationale,
            categories: result.moderation.categories,
            blocked: result.blocked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: EngineInfo,
    pub metrics: MetricsSnapshot,
}

/// Everything a handler can fail with
#[derive(Debug)]
pub enum ApiError {
    /// The body could not be read as the expected JSON shape
    Rejected(JsonRejection),
    Engine(EngineError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        ApiError::Engine(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected(rejection) => {
                let status = rejection.status();
                let body = serde_json::json!({ "detail": rejection.body_text() });
                (status, Json(body)).into_response()
            }
            ApiError::Engine(error) if error.is_client_error() => {
                let body = serde_json::json!({ "detail": error.to_string() });
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            ApiError::Engine(error) => {
                tracing::error!(error = %error, kind = error.kind(), "Request failed");
                let body = serde_json::json!({
                    "detail": error.to_string(),
                    "kind": error.kind(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
