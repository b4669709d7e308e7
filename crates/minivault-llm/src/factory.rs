//! Backend factory — turns the startup `BackendConfig` into a shared backend.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendKind, GenerationBackend, LlmError, RemoteBackend, StubBackend};

/// Which backend is active, and its parameters. Read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    #[default]
    Stubbed,
    Ollama {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

pub fn default_base_url()     -> String { "http://localhost:11434".to_string() }
pub fn default_model()        -> String { "tinyllama".to_string() }
pub fn default_timeout_secs() -> u64    { 120 }

impl BackendConfig {
    /// Remote configuration with every parameter at its default.
    pub fn ollama() -> Self {
        BackendConfig::Ollama {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Stubbed       => BackendKind::Stubbed,
            BackendConfig::Ollama { .. } => BackendKind::Ollama,
        }
    }
}

/// Construct the backend selected by `config`.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn GenerationBackend>, LlmError> {
    let backend: Arc<dyn GenerationBackend> = match config {
        BackendConfig::Stubbed => Arc::new(StubBackend::new()),
        BackendConfig::Ollama { base_url, model, timeout_secs } => {
            if base_url.trim().is_empty() {
                return Err(LlmError::Config("ollama base_url is empty".to_string()));
            }
            Arc::new(RemoteBackend::with_timeout(
                base_url.as_str(),
                model.as_str(),
                Duration::from_secs(*timeout_secs),
            )?)
        }
    };

    tracing::info!(llm_type = %backend.kind(), "generation backend ready");
    Ok(backend)
}
