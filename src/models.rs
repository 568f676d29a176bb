//! Data models for survey analysis.
//!
//! This module contains the survey definition (questions, options, answers)
//! and the structures produced by an analysis run.

use crate::error::StatusTransitionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a question within a survey.
pub type QuestionId = u64;

/// Label used for questions whose category is empty or whitespace.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Kind of a survey question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[serde(alias = "single")]
    SingleChoice,
    #[serde(alias = "multiple")]
    MultipleChoice,
    #[serde(alias = "text")]
    FreeText,
    #[serde(alias = "rating")]
    Scale,
}

impl QuestionType {
    /// Whether answers are resolved against enumerated options.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::SingleChoice => write!(f, "single choice"),
            QuestionType::MultipleChoice => write!(f, "multiple choice"),
            QuestionType::FreeText => write!(f, "free text"),
            QuestionType::Scale => write!(f, "scale"),
        }
    }
}

/// A selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Token submitted by the respondent.
    pub value: String,
    /// Display label.
    pub label: String,
    /// Option weight. Negative values mark penalized choices.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// A single survey question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique question id.
    pub id: QuestionId,
    /// Question text.
    #[serde(alias = "question_text")]
    pub text: String,
    /// Question kind.
    #[serde(rename = "type", alias = "question_type")]
    pub question_type: QuestionType,
    /// Category label. Empty labels land in [`UNCATEGORIZED`].
    #[serde(default)]
    pub category: String,
    /// Question weight (non-negative).
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Options for choice questions, in display order.
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// Display/report order within the category.
    #[serde(default)]
    pub order_index: i64,
}

impl Question {
    /// Find an option by its value token.
    pub fn option(&self, value: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.value == value)
    }
}

/// A respondent's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Referenced question id.
    pub question_id: QuestionId,
    /// Selected option value(s), or the free-text/scale response.
    #[serde(default, alias = "selected_answer", deserialize_with = "one_or_many")]
    pub selected: Vec<String>,
    /// Resolved weight of the answer.
    #[serde(default = "default_weight")]
    pub answer_weight: f64,
}

/// A survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<Question>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Quantitative score of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    /// Sum of per-question scores.
    pub raw_score: f64,
    /// Sum of question weights.
    pub max_score: f64,
    /// Normalized score in [0, 100].
    pub score: f64,
    /// Number of answered questions.
    pub answered: usize,
    /// Questions without a matching answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unanswered: Vec<QuestionId>,
    /// Set when every question in the category has weight zero.
    #[serde(default)]
    pub no_scorable_questions: bool,
}

/// Lifecycle status of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    PartiallyCompleted,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Completed | AnalysisStatus::PartiallyCompleted | AnalysisStatus::Failed
        )
    }

    /// Status only moves forward: pending -> processing -> terminal.
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        match self {
            AnalysisStatus::Pending => next == AnalysisStatus::Processing,
            AnalysisStatus::Processing => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Pending => write!(f, "pending"),
            AnalysisStatus::Processing => write!(f, "processing"),
            AnalysisStatus::Completed => write!(f, "completed"),
            AnalysisStatus::PartiallyCompleted => write!(f, "partially_completed"),
            AnalysisStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Analysis of a single category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    pub category: String,
    pub category_score: CategoryScore,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub analysis_summary: String,
    pub success: bool,
    /// Stable reason tag when `success` is false (e.g. "Timeout").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Tokens consumed by the successful reasoning call.
    pub tokens_used: u64,
    /// Reasoning attempts made.
    pub attempts: u32,
    /// Seconds spent on this category.
    pub processing_time: f64,
}

impl CategoryAnalysis {
    /// Build a failed analysis. The reason detail goes into the summary.
    pub fn failed(
        category_score: CategoryScore,
        reason: &str,
        detail: &str,
        attempts: u32,
        processing_time: f64,
    ) -> Self {
        Self {
            category: category_score.category.clone(),
            category_score,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            recommendations: Vec::new(),
            analysis_summary: format!("Analysis failed ({}): {}", reason, detail),
            success: false,
            failure_reason: Some(reason.to_string()),
            tokens_used: 0,
            attempts,
            processing_time,
        }
    }
}

/// Survey-level result of an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyAnalysisResult {
    pub survey_id: u64,
    pub status: AnalysisStatus,
    /// Number of successfully analyzed categories.
    pub categories_analyzed: usize,
    /// Per-category results in category first-appearance order.
    pub category_analyses: Vec<CategoryAnalysis>,
    pub overall_summary: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub priority_areas: Vec<String>,
    /// Set when the overall summary came from the deterministic template.
    #[serde(default)]
    pub aggregation_degraded: bool,
    /// Top-level reason for a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Wall time of the whole run, in seconds.
    pub processing_time: f64,
    pub llm_model_used: String,
    /// Sum of per-category token counts.
    pub tokens_used: u64,
    /// Tokens spent on the overall summary call.
    #[serde(default)]
    pub summary_tokens_used: u64,
    pub created_at: DateTime<Utc>,
}

impl SurveyAnalysisResult {
    /// Create the result for a run that has just started.
    pub fn begin(survey_id: u64, llm_model_used: impl Into<String>) -> Self {
        Self {
            survey_id,
            status: AnalysisStatus::Processing,
            categories_analyzed: 0,
            category_analyses: Vec::new(),
            overall_summary: String::new(),
            key_insights: Vec::new(),
            priority_areas: Vec::new(),
            aggregation_degraded: false,
            failure_reason: None,
            processing_time: 0.0,
            llm_model_used: llm_model_used.into(),
            tokens_used: 0,
            summary_tokens_used: 0,
            created_at: Utc::now(),
        }
    }

    /// Move the status forward, rejecting reversals.
    pub fn advance(&mut self, next: AnalysisStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Categories whose reasoning step failed.
    pub fn failed_categories(&self) -> impl Iterator<Item = &CategoryAnalysis> {
        self.category_analyses.iter().filter(|a| !a.success)
    }
}
