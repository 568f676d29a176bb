//! Markdown report generation.
//!
//! This module renders a [`SurveyAnalysisResult`] as a Markdown or JSON
//! report.

use crate::analysis::overall_score;
use crate::config::ReportConfig;
use crate::models::{AnalysisStatus, CategoryAnalysis, SurveyAnalysisResult};
use anyhow::Result;

/// Survey identity shown in the report header.
#[derive(Debug, Clone, Copy)]
pub struct ReportHeader<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(
    header: ReportHeader<'_>,
    result: &SurveyAnalysisResult,
    config: &ReportConfig,
) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# Survey Analysis: {}\n\n", header.title));
    if let Some(description) = header.description {
        output.push_str(&format!("*{}*\n\n", description));
    }

    output.push_str(&generate_metadata_section(result));
    output.push_str(&generate_summary_section(result));
    output.push_str(&generate_scores_section(&result.category_analyses, config));
    output.push_str(&generate_categories_section(&result.category_analyses));
    output.push_str(&generate_failures_section(result));
    output.push_str(&generate_footer());

    output
}

fn status_badge(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Completed => "🟢 **COMPLETED**",
        AnalysisStatus::PartiallyCompleted => "🟡 **PARTIALLY COMPLETED**",
        AnalysisStatus::Failed => "🔴 **FAILED**",
        AnalysisStatus::Pending | AnalysisStatus::Processing => "⚪ **IN PROGRESS**",
    }
}

/// Generate the metadata section.
fn generate_metadata_section(result: &SurveyAnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Survey ID:** {}\n", result.survey_id));
    section.push_str(&format!("- **Status:** {}\n", status_badge(result.status)));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        result.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", result.llm_model_used));
    section.push_str(&format!(
        "- **Categories Analyzed:** {}/{}\n",
        result.categories_analyzed,
        result.category_analyses.len()
    ));
    section.push_str(&format!(
        "- **Tokens Used:** {} (+{} for the overall summary)\n",
        result.tokens_used, result.summary_tokens_used
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        result.processing_time
    ));
    section.push('\n');

    section
}

/// Generate the overall summary section.
fn generate_summary_section(result: &SurveyAnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Overall Summary\n\n");
    section.push_str(&format!(
        "**Overall score:** {:.1}/100\n\n",
        overall_score(&result.category_analyses)
    ));
    section.push_str(&result.overall_summary);
    section.push_str("\n\n");

    if result.aggregation_degraded {
        section.push_str(
            "> ⚠️ The overall summary was generated from scores only; the reasoning backend was unavailable.\n\n",
        );
    }

    if !result.key_insights.is_empty() {
        section.push_str("### Key Insights\n\n");
        for insight in &result.key_insights {
            section.push_str(&format!("- {}\n", insight));
        }
        section.push('\n');
    }

    if !result.priority_areas.is_empty() {
        section.push_str("### Priority Areas\n\n");
        for (i, area) in result.priority_areas.iter().enumerate() {
            section.push_str(&format!("{}. {}\n", i + 1, area));
        }
        section.push('\n');
    }

    section
}

/// Generate the category score table.
fn generate_scores_section(analyses: &[CategoryAnalysis], config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Category Scores\n\n");

    if config.include_score_details {
        section.push_str("| Category | Score | Raw | Answered | Unanswered | Status |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    } else {
        section.push_str("| Category | Score | Status |\n");
        section.push_str("|:---|:---:|:---:|\n");
    }

    for analysis in analyses {
        let score = &analysis.category_score;
        let score_cell = if score.no_scorable_questions {
            "n/a".to_string()
        } else {
            format!("{:.1}", score.score)
        };
        let status = if analysis.success { "✅" } else { "❌" };

        if config.include_score_details {
            section.push_str(&format!(
                "| {} | {} | {:.2}/{:.2} | {} | {} | {} |\n",
                analysis.category,
                score_cell,
                score.raw_score,
                score.max_score,
                score.answered,
                score.unanswered.len(),
                status
            ));
        } else {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                analysis.category, score_cell, status
            ));
        }
    }
    section.push('\n');

    section
}

/// Generate one section per successfully analyzed category.
fn generate_categories_section(analyses: &[CategoryAnalysis]) -> String {
    let mut section = String::new();

    section.push_str("## Category Analyses\n\n");

    let successful: Vec<_> = analyses.iter().filter(|a| a.success).collect();
    if successful.is_empty() {
        section.push_str("No category could be analyzed.\n\n");
        return section;
    }

    for analysis in successful {
        section.push_str(&generate_category_block(analysis));
    }

    section
}

fn push_list(block: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    block.push_str(&format!("**{}:**\n\n", heading));
    for item in items {
        block.push_str(&format!("- {}\n", item));
    }
    block.push('\n');
}

/// Generate the block for a single category.
fn generate_category_block(analysis: &CategoryAnalysis) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} ({:.1})\n\n",
        analysis.category, analysis.category_score.score
    ));
    block.push_str(&format!("{}\n\n", analysis.analysis_summary));

    push_list(&mut block, "Strengths", &analysis.strengths);
    push_list(&mut block, "Weaknesses", &analysis.weaknesses);
    push_list(&mut block, "Recommendations", &analysis.recommendations);

    block.push_str(&format!(
        "*Attempts: {} | Tokens: {} | Time: {:.1}s*\n\n",
        analysis.attempts, analysis.tokens_used, analysis.processing_time
    ));
    block.push_str("---\n\n");

    block
}

/// Flatten text into a single Markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('|', "\\|")
}

/// Generate the failures section. Empty when nothing failed.
fn generate_failures_section(result: &SurveyAnalysisResult) -> String {
    let failed: Vec<_> = result.failed_categories().collect();
    if failed.is_empty() && result.failure_reason.is_none() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failures\n\n");

    if let Some(ref reason) = result.failure_reason {
        section.push_str(&format!("**Run failed:** {}\n\n", reason));
    }

    if !failed.is_empty() {
        section.push_str("| Category | Reason | Attempts | Detail |\n");
        section.push_str("|:---|:---:|:---:|:---|\n");
        for analysis in failed {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                table_cell(&analysis.category),
                analysis.failure_reason.as_deref().unwrap_or("unknown"),
                analysis.attempts,
                table_cell(&analysis.analysis_summary)
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by SurveyLens v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(result: &SurveyAnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}
