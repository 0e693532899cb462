//! Ollama connection settings.

use serde::{Deserialize, Serialize};

/// Default Ollama host (scheme included, no port).
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost";

/// Default Ollama port.
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Where to find the Ollama server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Host including scheme, e.g. `http://localhost`. A bare host name gets `http://`.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self { host: DEFAULT_OLLAMA_HOST.to_string(), port: DEFAULT_OLLAMA_PORT }
    }
}

impl OllamaConfig {
    /// Create a config for `host`:`port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Host with an explicit scheme.
    pub fn host_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            self.host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.host.trim_end_matches('/'))
        }
    }

    /// Full base URL, used in error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host_url(), self.port)
    }
}
