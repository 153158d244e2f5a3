use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::backend::BackendKind;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: String,
    pub model: String,
    pub ollama_url: String,
    pub reply_delay_ms: u64,
    pub reply_timeout_secs: u64,
    pub dictation_command: Option<String>,
    pub dark_mode: bool,
    pub sidebar_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Simulated.as_str().to_string(),
            model: "gemma3:latest".to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            reply_delay_ms: 1000,
            reply_timeout_secs: 60,
            dictation_command: None,
            dark_mode: false,
            sidebar_open: true,
        }
    }
}

impl Config {
    /// Load from the user's config dir, falling back to defaults when the file is missing.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(backend) = std::env::var("GUIDED_OPS_BACKEND") {
            self.backend = backend;
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            self.ollama_url = normalize_ollama_host(&host);
        }
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        BackendKind::parse(&self.backend)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs.max(1))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("guided-ops").join("config.json"))
    }
}

/// `OLLAMA_HOST` is commonly set without a scheme (`0.0.0.0:11434`).
fn normalize_ollama_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.backend_kind(), Some(BackendKind::Simulated));
        assert_eq!(config.reply_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            backend: "ollama".to_string(),
            dictation_command: Some("whisper-stream".to_string()),
            dark_mode: true,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "reply_delay_ms": 250 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.reply_delay_ms, 250);
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
        assert!(config.sidebar_open);
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = Config {
            reply_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.reply_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_normalize_ollama_host() {
        assert_eq!(normalize_ollama_host("0.0.0.0:11434"), "http://0.0.0.0:11434");
        assert_eq!(normalize_ollama_host("https://llm.local"), "https://llm.local");
    }
}
