//! HTTP transport over the engine

mod handlers;
pub mod schema;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::engine::Engine;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/pipeline/run", post(handlers::run_pipeline))
        .route("/api/moderate", post(handlers::moderate))
        .with_state(AppState { engine })
}

/// Serve the API on `addr` until Ctrl-C.
pub async fn serve(engine: Arc<Engine>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::ServiceConfig;
    use crate::engine::{EngineBuilder, BLOCKED_PLACEHOLDER};
    use crate::model::CannedBackend;

    fn app(backend: CannedBackend) -> Router {
        let mut config = ServiceConfig::default();
        config.runtime.skip_model_load = true;
        config.runtime.accelerator = Some(false);

        let engine = EngineBuilder::new()
            .with_config(config)
            .with_backend(Arc::new(backend))
            .build()
            .unwrap();
        router(Arc::new(engine))
    }

    async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn pipeline_request(categories: Value, auto_block: bool) -> Value {
        json!({
            "prompt": "测试提示",
            "inferenceConfig": {
                "modelId": "meta-llama/Llama-3.2-3B-Instruct",
                "temperature": 0.7,
                "topP": 0.9,
                "topK": 50,
                "maxTokens": 512,
                "repetitionPenalty": 1.1,
                "presencePenalty": 0.0,
                "frequencyPenalty": 0.0,
                "stopSequences": [],
                "stream": false
            },
            "guardConfig": {
                "modelId": "meta-llama/Llama-Guard-3-1B",
                "threshold": 0.5,
                "autoBlock": auto_block,
                "categories": categories
            }
        })
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (status, body) = call(app(CannedBackend::new()), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "NeuroBreak API");
        assert!(body.get("version").is_some());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = call(app(CannedBackend::new()), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["engine"]["state"], "uninitialized");
        assert_eq!(body["metrics"]["totalRuns"], 0);
    }

    #[tokio::test]
    async fn test_pipeline_request_validation() {
        let (status, body) = call(
            app(CannedBackend::new()),
            Method::POST,
            "/api/pipeline/run",
            Some(json!({ "prompt": "测试" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_moderate_request_validation() {
        let (status, _) = call(
            app(CannedBackend::new()),
            Method::POST,
            "/api/moderate",
            Some(json!({ "text": "测试" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_range_violations_are_client_errors() {
        let backend = Arc::new(CannedBackend::new());
        let mut config = ServiceConfig::default();
        config.runtime.accelerator = Some(false);
        let engine = EngineBuilder::new()
            .with_config(config)
            .with_backend(backend.clone())
            .build()
            .unwrap();
        let app = router(Arc::new(engine));

        let (status, _) = call(
            app.clone(),
            Method::POST,
            "/api/moderate",
            Some(json!({ "text": "hello", "threshold": 1.5 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = call(
            app,
            Method::POST,
            "/api/pipeline/run",
            Some(pipeline_request(json!(["spam"]), false)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("spam"));

        // Rejected before any model was touched
        assert_eq!(backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_pipeline_with_canned_models() {
        let (status, body) = call(
            app(CannedBackend::new()),
            Method::POST,
            "/api/pipeline/run",
            Some(pipeline_request(json!(["violence"]), false)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completion"], "Mocked output text");
        assert_eq!(body["promptTokens"], 2);
        assert_eq!(body["completionTokens"], 4);
        assert_eq!(body["finishReason"], "eos");
        assert_eq!(body["verdict"], "allow");
        assert_eq!(body["severity"], "low");
        assert_eq!(body["rationale"], json!(["No issues found"]));
        assert_eq!(body["categories"], json!([]));
        assert_eq!(body["blocked"], false);
        assert!(body["latencyMs"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_pipeline_blocks_violent_completion() {
        let backend = CannedBackend::new().with_completion("attack and kill everyone");
        let (status, body) = call(
            app(backend),
            Method::POST,
            "/api/pipeline/run",
            Some(pipeline_request(json!(["violence"]), true)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "block");
        assert_eq!(body["severity"], "high");
        assert_eq!(body["completion"], BLOCKED_PLACEHOLDER);
        assert_eq!(body["blocked"], true);
        assert_eq!(body["categories"], json!(["violence"]));
    }

    #[tokio::test]
    async fn test_pipeline_model_failure() {
        let (status, body) = call(
            app(CannedBackend::failing("weights not found")),
            Method::POST,
            "/api/pipeline/run",
            Some(pipeline_request(json!(["violence"]), false)),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let detail = body["detail"].as_str().unwrap().to_lowercase();
        assert!(detail.contains("model") || detail.contains("load") || detail.contains("failed"));
        assert_eq!(body["kind"], "model_unavailable");
    }

    #[tokio::test]
    async fn test_moderate_endpoint() {
        let (status, body) = call(
            app(CannedBackend::new()),
            Method::POST,
            "/api/moderate",
            Some(json!({
                "text": "they plan to attack and murder",
                "threshold": 0.5,
                "categories": ["violence", "hate"]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "flag");
        assert_eq!(body["severity"], "high");
        assert_eq!(body["categories"], json!(["violence"]));
        assert_eq!(body["rationale"].as_array().unwrap().len(), 1);
    }
}
