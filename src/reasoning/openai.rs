//! OpenAI-compatible chat completions backend.

use crate::config::ModelConfig;
use crate::error::ReasoningError;
use crate::reasoning::ollama::ChatMessage;
use crate::reasoning::transport::{ensure_success, http_client, map_send_error, read_json};
use crate::reasoning::{ChatBackend, Completion};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

/// Backend for OpenAI and API-compatible gateways.
pub struct OpenAiBackend {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiBackend {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            bail!("The openai provider requires an API key (set OPENAI_API_KEY or model.api_key)");
        };
        let base_url = config.base_url().trim_end_matches('/').to_string();
        info!("Using OpenAI-compatible model {} at {}", config.name, base_url);

        Ok(Self {
            http_client: http_client(config.timeout_seconds)?,
            base_url,
            api_key,
            model_name: config.name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

fn into_completion(response: ChatCompletionResponse) -> Result<Completion, ReasoningError> {
    let tokens_used = response.usage.map(|u| u.total_tokens).unwrap_or(0);
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ReasoningError::InvalidResponse("response has no choices".to_string()))?;

    Ok(Completion {
        content,
        tokens_used,
    })
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Completion, ReasoningError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatCompletionRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: json!({ "type": "json_object" }),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.base_url))?;

        let completion: ChatCompletionResponse =
            read_json(ensure_success(response).await?, &self.base_url).await?;

        let completion = into_completion(completion)?;
        debug!("Completion: {} chars, {} tokens", completion.content.len(), completion.tokens_used);
        Ok(completion)
    }
}
