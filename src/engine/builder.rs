use std::sync::Arc;

use crate::{
    config::ServiceConfig,
    error::Result,
    metrics::MetricsCollector,
    model::{ModelBackend, ModelManager},
};

use super::{engine::Engine, pipeline::Pipeline};

/// Builder for constructing an [`Engine`]
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<ServiceConfig>,
    backend: Option<Arc<dyn ModelBackend>>,
    manager: Option<Arc<ModelManager>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service configuration
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `backend` instead of the one the configuration selects
    pub fn with_backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Reuse an existing manager; its configuration wins over `with_config`
    pub fn with_manager(mut self, manager: Arc<ModelManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Build the engine instance
    pub fn build(self) -> Result<Engine> {
        let manager = match self.manager {
            Some(manager) => manager,
            None => {
                let config = self.config.unwrap_or_default();
                config.validate()?;
                let manager = match self.backend {
                    Some(backend) => ModelManager::new(config, backend),
                    None => ModelManager::from_config(config),
                };
                Arc::new(manager)
            }
        };
        manager.config().validate()?;

        let metrics = Arc::new(MetricsCollector::new());
        let pipeline = Pipeline::new(manager.clone(), metrics.clone());

        Ok(Engine {
            manager,
            pipeline,
            metrics,
        })
    }
}
