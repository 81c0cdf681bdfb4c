//! Model lifecycle: path resolution, backends and the shared manager

mod backend;
mod canned;
mod loader;
mod manager;
mod paths;
mod runtime;
mod tokenizer;

pub use backend::{
    CausalLm, DecodeSession, LoadRequest, ModelBackend, ModelPair, ModelRole, TokenCodec,
};
pub use canned::{CannedBackend, CANNED_COMPLETION};
pub use loader::{CandleBackend, ModelFiles};
pub use manager::{LoadedModel, ManagerState, ModelManager};
pub use paths::{get_model_path, ModelPathResolver, ModelSource, PathCandidate};
pub use runtime::LlamaRuntime;
pub use tokenizer::HfTokenCodec;
