use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::types::ModerationResult;

use super::schema::{
    ApiError, HealthResponse, ModerationRequest, PipelineRequest, PipelineResponse, RootResponse,
};
use super::AppState;

/// Service identity
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        service: crate::SERVICE_NAME,
        version: crate::VERSION,
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        engine: state.engine.info(),
        metrics: state.engine.metrics(),
    })
}

/// Generate a completion and moderate it
#[tracing::instrument(skip_all)]
pub async fn run_pipeline(
    State(state): State<AppState>,
    payload: Result<Json<PipelineRequest>, JsonRejection>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let Json(request) = payload?;
    request.inference_config.validate()?;
    request.guard_config.validate()?;

    let result = state
        .engine
        .run_pipeline(&request.prompt, &request.inference_config, &request.guard_config)
        .await?;
    Ok(Json(result.into()))
}

/// Moderate caller-supplied text without generating anything
#[tracing::instrument(skip_all)]
pub async fn moderate(
    State(state): State<AppState>,
    payload: Result<Json<ModerationRequest>, JsonRejection>,
) -> Result<Json<ModerationResult>, ApiError> {
    let Json(request) = payload?;
    let guard = request.guard_config(&state.engine.config().models.guard_model_id);
    guard.validate()?;

    let result = state.engine.moderate(&request.text, &guard).await?;
    Ok(Json(result))
}
