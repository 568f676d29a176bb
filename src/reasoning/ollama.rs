//! Ollama chat backend.

use crate::config::ModelConfig;
use crate::error::ReasoningError;
use crate::reasoning::transport::{ensure_success, http_client, map_send_error, read_json};
use crate::reasoning::{ChatBackend, Completion};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaChatResponse {
    fn tokens_used(&self) -> u64 {
        self.prompt_eval_count.unwrap_or(0) + self.eval_count.unwrap_or(0)
    }
}

/// Backend talking to a local or remote Ollama server.
pub struct OllamaBackend {
    http_client: reqwest::Client,
    base_url: String,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaBackend {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let base_url = config.base_url().trim_end_matches('/').to_string();
        info!("Using Ollama model {} at {}", config.name, base_url);

        Ok(Self {
            http_client: http_client(config.timeout_seconds)?,
            base_url,
            model_name: config.name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Completion, ReasoningError> {
        let url = format!("{}/api/chat", self.base_url);

        let request = OllamaChatRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.base_url))?;

        let chat_response: OllamaChatResponse =
            read_json(ensure_success(response).await?, &self.base_url).await?;

        let tokens_used = chat_response.tokens_used();
        debug!("Ollama reply: {} chars, {} tokens", chat_response.message.content.len(), tokens_used);

        Ok(Completion {
            content: chat_response.message.content,
            tokens_used,
        })
    }
}
