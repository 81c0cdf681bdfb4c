use std::error::Error as StdError;

/// Boxed error returned by model backends before the manager classifies it.
pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to load model '{model_id}': {message}")]
    ModelLoad {
        model_id: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Generation failed: {message}")]
    Generation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Moderation failed: {message}")]
    Moderation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Invalid value for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error for {parameter}: {message}")]
    Configuration { parameter: String, message: String },
}

/// Pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generation,
    Moderation,
}

impl EngineError {
    pub fn model_load(
        model_id: impl Into<String>,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        EngineError::ModelLoad {
            model_id: model_id.into(),
            message: message.into(),
            source,
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        EngineError::Generation {
            message: message.into(),
            source: None,
        }
    }

    pub fn moderation(message: impl Into<String>) -> Self {
        EngineError::Moderation {
            message: message.into(),
            source: None,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn configuration(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Configuration {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Wraps a backend failure raised while running `stage`.
    pub fn from_backend(stage: Stage, context: &str, source: BoxError) -> Self {
        let message = format!("{context}: {source}");
        match stage {
            Stage::Generation => EngineError::Generation {
                message,
                source: Some(source),
            },
            Stage::Moderation => EngineError::Moderation {
                message,
                source: Some(source),
            },
        }
    }

    /// Wraps a failed lazy load so that it surfaces as a failure of `stage`.
    pub fn model_unavailable(stage: Stage, load_error: EngineError) -> Self {
        if !matches!(load_error, EngineError::ModelLoad { .. }) {
            return load_error;
        }
        let message = format!("model unavailable: {load_error}");
        match stage {
            Stage::Generation => EngineError::Generation {
                message,
                source: Some(Box::new(load_error)),
            },
            Stage::Moderation => EngineError::Moderation {
                message,
                source: Some(Box::new(load_error)),
            },
        }
    }
}

/// Classification helpers used by the transport layer
pub trait ErrorExt {
    /// True when the failure comes from a model that is not loaded or failed to load.
    fn is_model_unavailable(&self) -> bool;
    /// True for malformed requests; these never reach the core.
    fn is_client_error(&self) -> bool;
    /// Short machine-readable class name.
    fn kind(&self) -> &'static str;
}

impl ErrorExt for EngineError {
    fn is_model_unavailable(&self) -> bool {
        match self {
            EngineError::ModelLoad { .. } => true,
            EngineError::Generation { source, .. } | EngineError::Moderation { source, .. } => source
                .as_ref()
                .and_then(|s| s.downcast_ref::<EngineError>())
                .map_or(false, |inner| inner.is_model_unavailable()),
            _ => false,
        }
    }

    fn is_client_error(&self) -> bool {
        matches!(self, EngineError::Validation { .. })
    }

    fn kind(&self) -> &'static str {
        if self.is_model_unavailable() {
            return "model_unavailable";
        }
        match self {
            EngineError::ModelLoad { .. } => "model_load",
            EngineError::Generation { .. } => "generation",
            EngineError::Moderation { .. } => "moderation",
            EngineError::Validation { .. } => "validation",
            EngineError::Configuration { .. } => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let error = EngineError::model_load("test/model", "config.json not found", None);
        assert_eq!(
            error.to_string(),
            "Failed to load model 'test/model': config.json not found"
        );
    }

    #[test]
    fn test_model_unavailable_wrapping() {
        let load = EngineError::model_load("test/model", "missing weights", None);
        let error = EngineError::model_unavailable(Stage::Generation, load);

        assert!(matches!(error, EngineError::Generation { .. }));
        assert!(error.is_model_unavailable());
        assert_eq!(error.kind(), "model_unavailable");

        let message = error.to_string().to_lowercase();
        assert!(message.contains("model") && message.contains("load"));
    }

    #[test]
    fn test_model_unavailable_passes_other_errors_through() {
        let error = EngineError::model_unavailable(
            Stage::Moderation,
            EngineError::moderation("unknown category 'spam'"),
        );
        assert!(!error.is_model_unavailable());
        assert_eq!(error.kind(), "moderation");
    }

    #[test]
    fn test_error_classification() {
        assert!(EngineError::validation("threshold", "must be in [0, 1]").is_client_error());
        assert!(!EngineError::generation("decoding exceeded budget").is_client_error());
        assert!(!EngineError::generation("decoding exceeded budget").is_model_unavailable());
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let error = EngineError::from_backend(
            Stage::Generation,
            "forward pass",
            "shape mismatch".into(),
        );
        assert_eq!(error.to_string(), "Generation failed: forward pass: shape mismatch");
        assert!(StdError::source(&error).is_some());
    }
}
