pub mod ollama;
pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::state::ChatMessage;

pub use ollama::OllamaBackend;
pub use simulated::SimulatedBackend;

/// Produces the assistant's reply for a conversation.
///
/// `history` is the full conversation in arrival order; its last entry is the
/// user message being answered. Implementations don't need to handle timeouts
/// or cancellation: the caller wraps the future in a timeout and aborts the
/// task it runs on.
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    async fn reply(&self, history: &[ChatMessage]) -> Result<String>;

    /// Short label for headers and logs.
    fn name(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Simulated,
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Simulated => "simulated",
            BackendKind::Ollama => "ollama",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "sim" => Some(BackendKind::Simulated),
            "ollama" => Some(BackendKind::Ollama),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn all() -> Vec<BackendKind> {
        vec![BackendKind::Simulated, BackendKind::Ollama]
    }
}

/// Build the backend named in the config. Unknown names fall back to the simulator.
pub fn from_config(config: &Config) -> Arc<dyn ReplyBackend> {
    let kind = config.backend_kind().unwrap_or_else(|| {
        tracing::warn!(backend = %config.backend, "unknown backend, using simulated replies");
        BackendKind::Simulated
    });

    match kind {
        BackendKind::Simulated => Arc::new(SimulatedBackend::new(config.reply_delay())),
        BackendKind::Ollama => Arc::new(OllamaBackend::new(&config.ollama_url, &config.model)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!(BackendKind::parse("Ollama"), Some(BackendKind::Ollama));
        assert_eq!(BackendKind::parse(" sim "), Some(BackendKind::Simulated));
        assert_eq!(BackendKind::parse("gpt"), None);
    }

    #[test]
    fn test_backend_kind_round_trips_through_str() {
        for kind in BackendKind::all() {
            assert_eq!(BackendKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_from_config_unknown_falls_back_to_simulated() {
        let config = Config {
            backend: "carrier-pigeon".to_string(),
            ..Config::default()
        };
        assert_eq!(from_config(&config).name(), "Simulated");
    }

    #[test]
    fn test_from_config_ollama_uses_model() {
        let config = Config {
            backend: "ollama".to_string(),
            model: "llama3.2:latest".to_string(),
            ..Config::default()
        };
        assert_eq!(from_config(&config).name(), "Ollama: llama3.2:latest");
    }
}
