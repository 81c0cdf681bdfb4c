use std::sync::Arc;

use anyhow::{Context, Result};
use neurobreak_engine::{
    server,
    utils::{setup_logging, LogConfig},
    EngineBuilder, ModelManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(LogConfig::from_env()).map_err(anyhow::Error::msg)?;

    // Configuration is read from the environment once, when the shared manager is built
    let manager = ModelManager::shared();
    let engine = EngineBuilder::new()
        .with_manager(manager)
        .build()
        .context("invalid service configuration")?;

    let info = engine.info();
    tracing::info!(
        version = neurobreak_engine::VERSION,
        backend = info.backend,
        hardware = %info.hardware,
        precision = %info.precision,
        llm = %info.llm_model_id,
        guard = %info.guard_model_id,
        "Starting NeuroBreak API"
    );

    if engine.config().runtime.preload_models {
        engine.preload().await.context("failed to preload models")?;
    }

    let addr = engine.config().bind_addr()?;
    server::serve(Arc::new(engine), addr)
        .await
        .context("server error")?;

    Ok(())
}
