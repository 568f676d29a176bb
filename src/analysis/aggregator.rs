//! Aggregation of per-category results into a survey-level verdict.
//!
//! Everything here is deterministic and runs after all category workers
//! have settled.

use crate::models::{AnalysisStatus, CategoryAnalysis};
use crate::reasoning::OverallFindings;

/// Categories scoring below this are listed as priority areas in the fallback.
pub const PRIORITY_THRESHOLD: f64 = 60.0;

/// Final run status from the category outcomes.
pub fn determine_status(analyses: &[CategoryAnalysis]) -> AnalysisStatus {
    let succeeded = analyses.iter().filter(|a| a.success).count();

    if succeeded == 0 {
        AnalysisStatus::Failed
    } else if succeeded == analyses.len() {
        AnalysisStatus::Completed
    } else {
        AnalysisStatus::PartiallyCompleted
    }
}

/// Sum of per-category token counts.
pub fn total_tokens(analyses: &[CategoryAnalysis]) -> u64 {
    analyses.iter().map(|a| a.tokens_used).sum()
}

/// Categories that have at least one question with positive weight.
pub fn scorable(analyses: &[CategoryAnalysis]) -> impl Iterator<Item = &CategoryAnalysis> {
    analyses
        .iter()
        .filter(|a| !a.category_score.no_scorable_questions)
}

/// Mean category score across scorable categories.
pub fn overall_score(analyses: &[CategoryAnalysis]) -> f64 {
    let scores: Vec<f64> = scorable(analyses).map(|a| a.category_score.score).collect();

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Highest-scoring scorable category; ties go to the earlier one.
pub fn strongest_category(analyses: &[CategoryAnalysis]) -> Option<&CategoryAnalysis> {
    scorable(analyses).fold(None, |best: Option<&CategoryAnalysis>, a| match best {
        Some(b) if b.category_score.score >= a.category_score.score => Some(b),
        _ => Some(a),
    })
}

/// Lowest-scoring scorable category; ties go to the earlier one.
pub fn weakest_category(analyses: &[CategoryAnalysis]) -> Option<&CategoryAnalysis> {
    scorable(analyses).fold(None, |worst: Option<&CategoryAnalysis>, a| match worst {
        Some(w) if w.category_score.score <= a.category_score.score => Some(w),
        _ => Some(a),
    })
}

fn describe(analysis: &CategoryAnalysis, detail: Option<&String>) -> String {
    let mut text = format!("{} ({:.1})", analysis.category, analysis.category_score.score);
    if let Some(detail) = detail {
        text.push_str(&format!(" - {}", detail));
    }
    text
}

/// Deterministic overall summary used when the reasoning backend cannot
/// produce one.
pub fn fallback_summary(analyses: &[CategoryAnalysis]) -> OverallFindings {
    let top_strength = strongest_category(analyses)
        .map(|a| describe(a, a.strengths.first()))
        .unwrap_or_else(|| "none".to_string());
    let top_concern = weakest_category(analyses)
        .map(|a| describe(a, a.weaknesses.first()))
        .unwrap_or_else(|| "none".to_string());

    let summary = format!(
        "Overall score {:.1} across {} categories; top strength: {}; top concern: {}",
        overall_score(analyses),
        scorable(analyses).count(),
        top_strength,
        top_concern
    );

    let mut below: Vec<&CategoryAnalysis> = scorable(analyses)
        .filter(|a| a.category_score.score < PRIORITY_THRESHOLD)
        .collect();
    below.sort_by(|a, b| {
        a.category_score
            .score
            .partial_cmp(&b.category_score.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    OverallFindings {
        summary,
        key_insights: Vec::new(),
        priority_areas: below.into_iter().map(|a| a.category.clone()).collect(),
        tokens_used: 0,
    }
}

/// Top-level reason for a run in which no category succeeded.
pub fn failure_reason(analyses: &[CategoryAnalysis]) -> String {
    if analyses.is_empty() {
        return "No categories could be derived from the survey".to_string();
    }

    let reasons: Vec<String> = analyses
        .iter()
        .map(|a| {
            format!(
                "{} ({})",
                a.category,
                a.failure_reason.as_deref().unwrap_or("unknown")
            )
        })
        .collect();

    format!(
        "All {} categories failed analysis: {}",
        analyses.len(),
        reasons.join(", ")
    )
}
