use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ReplyBackend;
use crate::error::{ChatError, Result};
use crate::state::ChatMessage;

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn chat_request<'a>(&'a self, history: &'a [ChatMessage]) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages: history
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ChatError::ReplyFailed(format!(
                "failed to list models: {}",
                response.status()
            )));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        Ok(models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect())
    }
}

#[async_trait]
impl ReplyBackend for OllamaBackend {
    async fn reply(&self, history: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&self.chat_request(history))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::ReplyFailed(format!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await?;
        Ok(chat_response.message.content)
    }

    fn name(&self) -> String {
        format!("Ollama: {}", self.model)
    }
}
