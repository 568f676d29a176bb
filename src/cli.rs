//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation.

use crate::config::Provider;
use crate::models::AnalysisStatus;
use clap::Parser;
use std::path::PathBuf;

/// SurveyLens - LLM-backed survey analysis
///
/// Scores a survey submission per category, asks a language model for
/// strengths, weaknesses and recommendations, and writes a graded report.
///
/// Examples:
///   surveylens --input submission.json
///   surveylens --input submission.json --provider openai --model gpt-4o-mini
///   surveylens --input submission.json --format json --output analysis.json
///   surveylens --input submission.json --dry-run
///   surveylens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Survey submission file (JSON with `survey` and `answers`)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Reasoning provider
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<Provider>,

    /// Model to use for analysis
    ///
    /// Can also be set via SURVEYLENS_MODEL env var or .surveylens.toml config.
    #[arg(short, long, env = "SURVEYLENS_MODEL")]
    pub model: Option<String>,

    /// Provider API base URL
    #[arg(long, value_name = "URL", env = "SURVEYLENS_BASE_URL")]
    pub base_url: Option<String>,

    /// API key for the openai provider
    #[arg(long, value_name = "KEY", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .surveylens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Reasoning attempts per category
    #[arg(long, value_name = "COUNT")]
    pub max_attempts: Option<u32>,

    /// Reasoning calls allowed in flight at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Deadline for the whole analysis in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Exit with code 2 when the run ends at or below this outcome
    ///
    /// Values: partial (partially_completed or failed), failed
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Dry run: group and score the survey without calling the LLM
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .surveylens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Outcome threshold for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FailOnLevel {
    Partial,
    Failed,
}

impl FailOnLevel {
    /// Whether a final status meets this failure threshold.
    pub fn is_triggered_by(&self, status: AnalysisStatus) -> bool {
        match self {
            FailOnLevel::Partial => matches!(
                status,
                AnalysisStatus::PartiallyCompleted | AnalysisStatus::Failed
            ),
            FailOnLevel::Failed => status == AnalysisStatus::Failed,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.is_file() => {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            None => return Err("An input file is required (--input)".to_string()),
            _ => {}
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.max_attempts == Some(0) {
            return Err("Max attempts must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_args(input: PathBuf) -> Args {
        Args {
            input: Some(input),
            provider: None,
            model: None,
            base_url: None,
            api_key: None,
            output: None,
            config: None,
            verbose: false,
            quiet: false,
            format: OutputFormat::Markdown,
            temperature: None,
            timeout: None,
            max_attempts: None,
            concurrency: None,
            deadline: None,
            fail_on: None,
            dry_run: false,
            init_config: false,
        }
    }

    fn input_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        file
    }

    #[test]
    fn test_validation_accepts_defaults() {
        let file = input_file();
        assert!(make_args(file.path().to_path_buf()).validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let args = make_args(PathBuf::from("/nonexistent/submission.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let file = input_file();
        let mut args = make_args(file.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let file = input_file();
        let mut args = make_args(file.path().to_path_buf());
        args.max_attempts = Some(0);
        assert!(args.validate().is_err());

        args.max_attempts = None;
        args.concurrency = Some(0);
        assert!(args.validate().is_err());

        args.concurrency = None;
        args.base_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_fail_on_thresholds() {
        assert!(FailOnLevel::Partial.is_triggered_by(AnalysisStatus::PartiallyCompleted));
        assert!(FailOnLevel::Partial.is_triggered_by(AnalysisStatus::Failed));
        assert!(!FailOnLevel::Partial.is_triggered_by(AnalysisStatus::Completed));
        assert!(FailOnLevel::Failed.is_triggered_by(AnalysisStatus::Failed));
        assert!(!FailOnLevel::Failed.is_triggered_by(AnalysisStatus::PartiallyCompleted));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(PathBuf::from("x.json"));
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
