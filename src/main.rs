//! SurveyLens - LLM-backed survey analysis
//!
//! A CLI tool that scores a survey submission per category, asks a
//! language model for narrative findings, and writes a graded report.
//!
//! Exit codes:
//!   0 - Success (or outcome better than the --fail-on threshold)
//!   1 - Runtime error (invalid input, config, unreachable backend setup, etc.)
//!   2 - Analysis outcome at or below the --fail-on threshold

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod reasoning;
mod report;
mod survey;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::SurveyAnalysisResult;
use pipeline::{PipelineOptions, SurveyAnalysisPipeline};
use report::ReportHeader;
use std::path::PathBuf;
use std::time::Duration;
use survey::SurveySubmission;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("SurveyLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .surveylens.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize provider, model, retries, and deadlines.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` takes precedence over the CLI verbosity.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(args.log_level()).into())
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
async fn run_analysis(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input = args
        .input
        .as_deref()
        .context("An input file is required (--input)")?;

    // Step 1: Load the submission
    println!("📥 Loading submission: {}", input.display());
    let submission = survey::load_submission(input)?;
    info!(
        "Survey {} ('{}'): {} questions, {} answers",
        submission.survey.id,
        submission.survey.title,
        submission.survey.questions.len(),
        submission.answers.len()
    );

    if args.dry_run {
        return handle_dry_run(&submission);
    }

    // Step 2: Set up the reasoning client
    println!("🤖 Initializing reasoning client...");
    println!("   Provider: {:?}", config.model.provider);
    println!("   Model: {}", config.model.name);
    println!("   Endpoint: {}", config.model.base_url());
    println!(
        "   Attempts: {} | Concurrency: {} | Deadline: {}",
        config.pipeline.max_attempts,
        config.pipeline.max_concurrency,
        match config.pipeline.deadline() {
            Some(deadline) => format!("{}s", deadline.as_secs()),
            None => "none".to_string(),
        }
    );

    let client = reasoning::build_client(&config.model)?;
    let pipeline = SurveyAnalysisPipeline::new(client, PipelineOptions::from(&config.pipeline));

    // Step 3: Run the pipeline
    println!("\n🔬 Analyzing survey...");
    let spinner = (!args.quiet).then(analysis_spinner);
    let outcome = pipeline
        .run(&submission.survey, &submission.answers)
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = outcome.context("Survey could not be analyzed")?;

    // Step 4: Generate and save the report
    println!("\n📝 Generating report...");
    let header = ReportHeader {
        title: &submission.survey.title,
        description: submission.survey.description.as_deref(),
    };
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&result)?,
        OutputFormat::Markdown => report::generate_markdown_report(header, &result, &config.report),
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&result);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        if fail_level.is_triggered_by(result.status) {
            eprintln!(
                "\n⛔ Analysis ended {} (threshold: {:?}). Failing (exit code 2).",
                result.status, fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

fn analysis_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Waiting for category analyses");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Report path: explicit --output, else the configured default. JSON output
/// swaps a default `.md` extension for `.json`.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }

    let path = PathBuf::from(&config.general.output);
    let is_markdown = path.extension().is_some_and(|ext| ext == "md");
    if args.format == OutputFormat::Json && is_markdown {
        path.with_extension("json")
    } else {
        path
    }
}

fn print_summary(result: &SurveyAnalysisResult) {
    println!("\n📊 Analysis Summary:");
    println!("   Status: {}", result.status);
    println!(
        "   Categories analyzed: {}/{}",
        result.categories_analyzed,
        result.category_analyses.len()
    );
    for failed in result.failed_categories() {
        println!(
            "   - ❌ {}: {}",
            failed.category,
            failed.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
    if result.aggregation_degraded {
        println!("   Overall summary: fallback (reasoning backend unavailable)");
    }
    println!(
        "   Tokens: {} (+{} summary)",
        result.tokens_used, result.summary_tokens_used
    );
    println!("   Duration: {:.1}s", result.processing_time);
}

/// Handle --dry-run: validate, group and score the survey, print it, exit.
///
/// Input the pipeline would reject fails here too.
fn handle_dry_run(submission: &SurveySubmission) -> Result<i32> {
    println!("\n🔍 Dry run: scoring survey (no LLM call)...\n");

    let answers = pipeline::runner::validate_submission(&submission.survey, &submission.answers)
        .context("Survey could not be analyzed")?;
    let groups = analysis::group_by_category(&submission.survey.questions, &answers);

    println!("   Found {} categories that would be analyzed:\n", groups.len());
    for group in &groups {
        let score = analysis::category_score(group);
        if score.no_scorable_questions {
            println!(
                "     📂 {} ({} questions, no scorable questions)",
                group.category,
                group.items.len()
            );
        } else {
            println!(
                "     📂 {} ({} questions, {} answered): {:.1}/100",
                group.category,
                group.items.len(),
                score.answered,
                score.score
            );
        }
    }

    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_output_path_defaults() {
        let config = Config::default();

        let args = Args::parse_from(["surveylens", "--input", "s.json"]);
        assert_eq!(output_path(&args, &config), PathBuf::from("survey_analysis.md"));

        let args = Args::parse_from(["surveylens", "--input", "s.json", "--format", "json"]);
        assert_eq!(output_path(&args, &config), PathBuf::from("survey_analysis.json"));

        let args = Args::parse_from([
            "surveylens", "--input", "s.json", "--format", "json", "--output", "out.md",
        ]);
        assert_eq!(output_path(&args, &config), PathBuf::from("out.md"));
    }

    #[test]
    fn test_dry_run_on_fixture() {
        let submission = tokio_test::assert_ok!(survey::loader::parse_submission(include_str!(
            "../fixtures/team_health.json"
        )));
        assert_eq!(handle_dry_run(&submission).unwrap(), 0);
    }

    #[test]
    fn test_dry_run_rejects_what_the_pipeline_rejects() {
        let mut submission = tokio_test::assert_ok!(survey::loader::parse_submission(
            include_str!("../fixtures/team_health.json")
        ));
        let duplicate = submission.survey.questions[0].clone();
        submission.survey.questions.push(duplicate);
        let err = tokio_test::assert_err!(handle_dry_run(&submission));
        assert!(format!("{:#}", err).contains("question id 1 appears more than once"));

        submission.survey.questions.clear();
        let err = tokio_test::assert_err!(handle_dry_run(&submission));
        assert!(format!("{:#}", err).contains("no questions"));
    }
}
