//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.surveylens.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".surveylens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "survey_analysis.md".to_string()
}

/// Reasoning provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Ollama `/api/chat`
    #[default]
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions`
    Openai,
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend provider.
    #[serde(default)]
    pub provider: Provider,

    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// API base URL. Defaults depend on the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key (openai provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in a response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            name: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl ModelConfig {
    /// Configured base URL, or the provider's default.
    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url,
            (None, Provider::Ollama) => "http://localhost:11434",
            (None, Provider::Openai) => "https://api.openai.com",
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_timeout() -> u64 {
    120
}

/// Analysis pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reasoning attempts per category (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles afterwards.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Reasoning calls allowed in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Deadline for the whole run in seconds. 0 disables it.
    #[serde(default = "default_deadline")]
    pub deadline_seconds: u64,

    /// Timeout for a single reasoning attempt in seconds. 0 disables it.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_concurrency: default_max_concurrency(),
            deadline_seconds: default_deadline(),
            attempt_timeout_seconds: default_attempt_timeout(),
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_seconds > 0).then(|| Duration::from_secs(self.deadline_seconds))
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.attempt_timeout_seconds > 0).then(|| Duration::from_secs(self.attempt_timeout_seconds))
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_deadline() -> u64 {
    600
}

fn default_attempt_timeout() -> u64 {
    120
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Show answered/unanswered counts per category.
    #[serde(default = "default_true")]
    pub include_score_details: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_score_details: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only arguments that were explicitly provided override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(provider) = args.provider {
            self.model.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref base_url) = args.base_url {
            self.model.base_url = Some(base_url.clone());
        }
        if let Some(ref api_key) = args.api_key {
            self.model.api_key = Some(api_key.clone());
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(max_attempts) = args.max_attempts {
            self.pipeline.max_attempts = max_attempts;
        }
        if let Some(concurrency) = args.concurrency {
            self.pipeline.max_concurrency = concurrency;
        }
        if let Some(deadline) = args.deadline {
            self.pipeline.deadline_seconds = deadline;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.model.provider, Provider::Ollama);
        assert_eq!(config.model.base_url(), "http://localhost:11434");
        assert_eq!(config.pipeline.max_attempts, 2);
        assert_eq!(config.pipeline.deadline(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"

[model]
provider = "openai"
name = "gpt-4o-mini"
temperature = 0.2

[pipeline]
max_attempts = 4
deadline_seconds = 0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.model.provider, Provider::Openai);
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.base_url(), "https://api.openai.com");
        assert_eq!(config.pipeline.max_attempts, 4);
        assert_eq!(config.pipeline.max_concurrency, 4);
        assert_eq!(config.pipeline.deadline(), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\nname = \"qwen2.5:14b\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.model.name, "qwen2.5:14b");

        let missing = Config::load(Path::new("/nonexistent/.surveylens.toml"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_cli_overrides_only_explicit_values() {
        let mut config: Config = toml::from_str("[model]\nname = \"from-file\"\n").unwrap();
        let args = Args::parse_from(["surveylens", "--input", "survey.json", "--max-attempts", "5"]);

        config.merge_with_args(&args);
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.pipeline.max_concurrency, 4);
        assert_eq!(config.general.output, "survey_analysis.md");
        if std::env::var("SURVEYLENS_MODEL").is_err() {
            assert_eq!(config.model.name, "from-file");
        }
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[pipeline]"));
        assert!(!toml_str.contains("api_key"));
        assert!(!toml_str.contains("verbose"));
    }

    #[test]
    fn test_legacy_verbose_key_is_ignored() {
        let config: Config =
            toml::from_str("[general]\noutput = \"r.md\"\nverbose = true\n").unwrap();
        assert_eq!(config.general.output, "r.md");
    }
}
