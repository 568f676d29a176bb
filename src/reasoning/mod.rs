//! Reasoning capability used to produce narrative findings.
//!
//! The pipeline only sees [`ReasoningClient`]. Concrete clients wrap a
//! [`ChatBackend`] (Ollama, OpenAI-compatible) with prompt construction and
//! strict response validation.

pub mod ollama;
pub mod openai;
pub mod prompts;
pub mod response;
pub mod transport;

use crate::analysis::CategoryGroup;
use crate::config::{ModelConfig, Provider};
use crate::error::ReasoningError;
use crate::models::{CategoryAnalysis, CategoryScore};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Input for one category's reasoning call.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRequest<'a> {
    pub survey_title: &'a str,
    pub survey_description: Option<&'a str>,
    pub group: &'a CategoryGroup,
    pub score: &'a CategoryScore,
}

/// Input for the overall summary call.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub survey_title: &'a str,
    pub survey_description: Option<&'a str>,
    /// Successful category analyses, in category order.
    pub analyses: &'a [CategoryAnalysis],
}

/// Narrative findings for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFindings {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub summary: String,
    pub tokens_used: u64,
}

/// Survey-level synthesis over the per-category findings.
#[derive(Debug, Clone, PartialEq)]
pub struct OverallFindings {
    pub summary: String,
    pub key_insights: Vec<String>,
    pub priority_areas: Vec<String>,
    pub tokens_used: u64,
}

/// External reasoning service.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Identity reported as `llm_model_used`.
    fn model_name(&self) -> &str;

    async fn analyze_category(
        &self,
        request: &CategoryRequest<'_>,
    ) -> Result<CategoryFindings, ReasoningError>;

    async fn summarize(&self, request: &SummaryRequest<'_>)
        -> Result<OverallFindings, ReasoningError>;
}

/// Raw completion returned by a chat backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tokens_used: u64,
}

/// A chat-completion provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<Completion, ReasoningError>;
}

/// [`ReasoningClient`] built on any [`ChatBackend`].
pub struct ChatReasoningClient<B> {
    backend: B,
}

impl<B: ChatBackend> ChatReasoningClient<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: ChatBackend> ReasoningClient for ChatReasoningClient<B> {
    fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    async fn analyze_category(
        &self,
        request: &CategoryRequest<'_>,
    ) -> Result<CategoryFindings, ReasoningError> {
        let prompt = prompts::category_prompt(request);
        debug!(
            "Requesting analysis for category '{}' ({} chars)",
            request.group.category,
            prompt.len()
        );

        let completion = self
            .backend
            .complete(prompts::CATEGORY_SYSTEM_PROMPT, &prompt)
            .await?;
        response::parse_category_findings(&completion.content, completion.tokens_used)
    }

    async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<OverallFindings, ReasoningError> {
        let prompt = prompts::summary_prompt(request);
        let completion = self
            .backend
            .complete(prompts::SUMMARY_SYSTEM_PROMPT, &prompt)
            .await?;
        response::parse_overall_findings(&completion.content, completion.tokens_used)
    }
}

/// Build the reasoning client selected by the model configuration.
pub fn build_client(config: &ModelConfig) -> Result<Arc<dyn ReasoningClient>> {
    let client: Arc<dyn ReasoningClient> = match config.provider {
        Provider::Ollama => Arc::new(ChatReasoningClient::new(OllamaBackend::new(config)?)),
        Provider::Openai => Arc::new(ChatReasoningClient::new(OpenAiBackend::new(config)?)),
    };
    Ok(client)
}

#[cfg(test)]
pub mod testing {
    //! Scripted reasoning client for pipeline tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// One scripted reply.
    #[derive(Debug, Clone)]
    pub struct Scripted<T> {
        pub delay: Duration,
        pub outcome: Result<T, ReasoningError>,
    }

    pub fn ok<T>(value: T) -> Scripted<T> {
        Scripted {
            delay: Duration::ZERO,
            outcome: Ok(value),
        }
    }

    pub fn fail<T>(error: ReasoningError) -> Scripted<T> {
        Scripted {
            delay: Duration::ZERO,
            outcome: Err(error),
        }
    }

    pub fn slow<T>(delay: Duration, scripted: Scripted<T>) -> Scripted<T> {
        Scripted { delay, ..scripted }
    }

    pub fn findings(category: &str, tokens_used: u64) -> CategoryFindings {
        CategoryFindings {
            strengths: vec![format!("{} strength", category)],
            weaknesses: vec![format!("{} weakness", category)],
            recommendations: vec![format!("Practice {}", category)],
            summary: format!("{} looks solid overall.", category),
            tokens_used,
        }
    }

    pub fn overall(tokens_used: u64) -> OverallFindings {
        OverallFindings {
            summary: "Strong respondent with a few gaps.".to_string(),
            key_insights: vec!["Consistent answers".to_string()],
            priority_areas: vec!["Planning".to_string()],
            tokens_used,
        }
    }

    /// Replies follow each queue in order; the last entry repeats.
    /// Categories without a script succeed with 100 tokens.
    pub struct ScriptedClient {
        model: String,
        categories: Mutex<HashMap<String, VecDeque<Scripted<CategoryFindings>>>>,
        summary: Mutex<VecDeque<Scripted<OverallFindings>>>,
        calls: Mutex<HashMap<String, u32>>,
    }

    fn next<T: Clone>(queue: &mut VecDeque<Scripted<T>>) -> Option<Scripted<T>> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    impl ScriptedClient {
        pub fn new(model: &str) -> Self {
            Self {
                model: model.to_string(),
                categories: Mutex::new(HashMap::new()),
                summary: Mutex::new(VecDeque::new()),
                calls: Mutex::new(HashMap::new()),
            }
        }

        pub fn on_category(self, category: &str, replies: Vec<Scripted<CategoryFindings>>) -> Self {
            self.categories
                .lock()
                .unwrap()
                .insert(category.to_string(), replies.into());
            self
        }

        pub fn on_summary(self, replies: Vec<Scripted<OverallFindings>>) -> Self {
            *self.summary.lock().unwrap() = replies.into();
            self
        }

        /// Number of calls made for a category (or "__summary__").
        pub fn calls(&self, key: &str) -> u32 {
            self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
        }

        fn record(&self, key: &str) {
            *self.calls.lock().unwrap().entry(key.to_string()).or_default() += 1;
        }
    }

    #[async_trait]
    impl ReasoningClient for ScriptedClient {
        fn model_name(&self) -> &str {
            &self.model
        }

        async fn analyze_category(
            &self,
            request: &CategoryRequest<'_>,
        ) -> Result<CategoryFindings, ReasoningError> {
            let category = request.group.category.clone();
            self.record(&category);
            let reply = {
                let mut scripts = self.categories.lock().unwrap();
                scripts.get_mut(&category).and_then(next)
            }
            .unwrap_or_else(|| ok(findings(&category, 100)));

            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            reply.outcome
        }

        async fn summarize(
            &self,
            _request: &SummaryRequest<'_>,
        ) -> Result<OverallFindings, ReasoningError> {
            self.record("__summary__");
            let reply = next(&mut self.summary.lock().unwrap()).unwrap_or_else(|| ok(overall(50)));
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            reply.outcome
        }
    }
}
