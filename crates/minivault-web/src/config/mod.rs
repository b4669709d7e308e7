//! Configuration loading for Minivault.
//! Reads minivault.toml from the current directory or the path in MINIVAULT_CONFIG,
//! then applies MINIVAULT_* environment overrides. A missing file means defaults.

use minivault_common::{MinivaultError, DEFAULT_MAX_PROMPT_CHARS};
use minivault_llm::BackendConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm_service: BackendConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_host()             -> String { "127.0.0.1".to_string() }
fn default_port()             -> u16    { 8000 }
fn default_max_prompt_chars() -> usize  { DEFAULT_MAX_PROMPT_CHARS }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_log_dir() -> PathBuf { PathBuf::from("logs") }

impl Default for AuditConfig {
    fn default() -> Self {
        Self { log_dir: default_log_dir() }
    }
}

mod tests;

impl Config {
    /// Load configuration from minivault.toml plus environment overrides.
    /// Checks MINIVAULT_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("MINIVAULT_CONFIG")
            .unwrap_or_else(|_| "minivault.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml(&content)?
        } else {
            tracing::info!("No config file at {path}; using defaults");
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply MINIVAULT_* overrides. `var` looks up one variable by name.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), MinivaultError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = var("MINIVAULT_LLM_SERVICE__TYPE") {
            self.llm_service = match (kind.as_str(), &self.llm_service) {
                ("stubbed", _) => BackendConfig::Stubbed,
                ("ollama", BackendConfig::Ollama { .. }) => self.llm_service.clone(),
                ("ollama", _) => BackendConfig::ollama(),
                (other, _) => {
                    return Err(MinivaultError::Config(format!(
                        "MINIVAULT_LLM_SERVICE__TYPE must be \"stubbed\" or \"ollama\", got {other:?}"
                    )))
                }
            };
        }

        let model = var("MINIVAULT_LLM_SERVICE__MODEL");
        let url = var("MINIVAULT_LLM_SERVICE__BASE_URL");
        match &mut self.llm_service {
            BackendConfig::Ollama { base_url, model: m, .. } => {
                if let Some(model) = model { *m = model; }
                if let Some(url) = url { *base_url = url; }
            }
            BackendConfig::Stubbed => {
                if model.is_some() || url.is_some() {
                    tracing::warn!("MINIVAULT_LLM_SERVICE__MODEL/BASE_URL ignored: stubbed backend selected");
                }
            }
        }

        if let Some(dir) = var("MINIVAULT_LOG_DIR") {
            self.audit.log_dir = PathBuf::from(dir);
        }
        if let Some(host) = var("MINIVAULT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("MINIVAULT_PORT") {
            self.server.port = port.parse().map_err(|_| {
                MinivaultError::Config(format!("MINIVAULT_PORT is not a port number: {port:?}"))
            })?;
        }
        if let Some(max) = var("MINIVAULT_MAX_PROMPT_CHARS") {
            self.server.max_prompt_chars = max.parse().map_err(|_| {
                MinivaultError::Config(format!("MINIVAULT_MAX_PROMPT_CHARS is not a number: {max:?}"))
            })?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, MinivaultError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| MinivaultError::Config(format!("invalid bind address: {e}")))
    }

    /// Remote parameters, when the remote backend is selected.
    pub fn remote_summary(&self) -> Option<(String, String)> {
        match &self.llm_service {
            BackendConfig::Ollama { base_url, model, .. } => Some((base_url.clone(), model.clone())),
            BackendConfig::Stubbed => None,
        }
    }
}
