// Location: src/model/paths.rs

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;

/// Where a model's artifacts come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A directory on the local filesystem
    Local(PathBuf),
    /// A Hugging Face hub repository id, fetched by the loader
    Hub(String),
}

impl ModelSource {
    pub fn is_local(&self) -> bool {
        matches!(self, ModelSource::Local(_))
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Local(path) => write!(f, "{}", path.display()),
            ModelSource::Hub(id) => write!(f, "hub:{}", id),
        }
    }
}

/// One filesystem location to try, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathCandidate {
    Local(PathBuf),
    Container(PathBuf),
    Workspace(PathBuf),
}

impl PathCandidate {
    fn path(&self) -> &Path {
        match self {
            PathCandidate::Local(p) | PathCandidate::Container(p) | PathCandidate::Workspace(p) => p,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PathCandidate::Local(_) => "local",
            PathCandidate::Container(_) => "container",
            PathCandidate::Workspace(_) => "workspace",
        }
    }

    /// Found when the path is non-empty and exists; anything else means "try the next one".
    fn probe(&self) -> Option<&Path> {
        let path = self.path();
        if path.as_os_str().is_empty() || !path.exists() {
            return None;
        }
        Some(path)
    }
}

/// Ordered fallback chain ending in the hub id, which always resolves.
#[derive(Debug, Clone, Default)]
pub struct ModelPathResolver {
    candidates: Vec<PathCandidate>,
}

impl ModelPathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidate(mut self, candidate: PathCandidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    /// Candidates for `model_id` under the configured roots, e.g.
    /// `/models/meta-llama/Llama-3.2-3B-Instruct`.
    pub fn for_model(model_id: &str, config: &ModelConfig) -> Self {
        let mut resolver = Self::new();
        if let Some(root) = &config.local_dir {
            resolver = resolver.with_candidate(PathCandidate::Local(root.join(model_id)));
        }
        if let Some(root) = &config.container_dir {
            resolver = resolver.with_candidate(PathCandidate::Container(root.join(model_id)));
        }
        if let Some(root) = &config.workspace_dir {
            resolver = resolver.with_candidate(PathCandidate::Workspace(root.join(model_id)));
        }
        resolver
    }

    pub fn candidates(&self) -> &[PathCandidate] {
        &self.candidates
    }

    pub fn resolve(&self, model_id: &str) -> ModelSource {
        for candidate in &self.candidates {
            if let Some(path) = candidate.probe() {
                tracing::debug!(
                    model_id,
                    kind = candidate.label(),
                    path = %path.display(),
                    "Resolved model path"
                );
                return ModelSource::Local(path.to_path_buf());
            }
        }
        tracing::debug!(model_id, "No local copy found, falling back to hub id");
        ModelSource::Hub(model_id.to_string())
    }
}

/// Resolve `model_id` against explicit local, container and workspace paths.
///
/// The first existing path wins; when none exists the id itself is returned
/// as a hub reference. Missing paths are never an error.
pub fn get_model_path(
    model_id: &str,
    local_path: impl AsRef<Path>,
    container_path: impl AsRef<Path>,
    workspace_path: impl AsRef<Path>,
) -> ModelSource {
    ModelPathResolver::new()
        .with_candidate(PathCandidate::Local(local_path.as_ref().to_path_buf()))
        .with_candidate(PathCandidate::Container(container_path.as_ref().to_path_buf()))
        .with_candidate(PathCandidate::Workspace(workspace_path.as_ref().to_path_buf()))
        .resolve(model_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_get_model_path_fallback() {
        let result = get_model_path(
            "test/model",
            "/nonexistent/path",
            "/nonexistent/container",
            "",
        );
        assert_eq!(result, ModelSource::Hub("test/model".to_string()));
    }

    #[test]
    fn test_local_path_wins() {
        let local = tempdir().unwrap();
        let container = tempdir().unwrap();
        let workspace = tempdir().unwrap();

        let result = get_model_path("test/model", local.path(), container.path(), workspace.path());
        assert_eq!(result, ModelSource::Local(local.path().to_path_buf()));
    }

    #[test]
    fn test_resolution_order() {
        let container = tempdir().unwrap();
        let workspace = tempdir().unwrap();

        let result = get_model_path("test/model", "/nonexistent/path", container.path(), workspace.path());
        assert_eq!(result, ModelSource::Local(container.path().to_path_buf()));

        let result = get_model_path("test/model", "", "/nonexistent/container", workspace.path());
        assert_eq!(result, ModelSource::Local(workspace.path().to_path_buf()));
    }

    #[test]
    fn test_resolver_from_config_roots() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("meta-llama/Llama-Guard-3-1B")).unwrap();

        let config = ModelConfig {
            local_dir: Some(PathBuf::from("/nonexistent/local")),
            container_dir: None,
            workspace_dir: Some(root.path().to_path_buf()),
            ..ModelConfig::default()
        };

        let resolver = ModelPathResolver::for_model("meta-llama/Llama-Guard-3-1B", &config);
        assert_eq!(resolver.candidates().len(), 2);
        assert_eq!(
            resolver.resolve("meta-llama/Llama-Guard-3-1B"),
            ModelSource::Local(root.path().join("meta-llama/Llama-Guard-3-1B"))
        );

        let missing = ModelPathResolver::for_model("acme/unknown", &config).resolve("acme/unknown");
        assert_eq!(missing, ModelSource::Hub("acme/unknown".to_string()));
        assert!(!missing.is_local());
    }
}
