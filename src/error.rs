//! Error types for the analysis pipeline.

use crate::models::{AnalysisStatus, QuestionId};
use thiserror::Error;

/// Structural problems with the input that abort the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("survey has no questions; nothing to analyze")]
    NoQuestions,

    #[error("question id {0} appears more than once")]
    DuplicateQuestionId(QuestionId),
}

/// Failure of a single reasoning call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningError {
    #[error("reasoning call timed out")]
    Timeout,

    #[error("reasoning backend rate limited the request")]
    RateLimited,

    #[error("reasoning backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid response from reasoning backend: {0}")]
    InvalidResponse(String),
}

impl ReasoningError {
    /// Only transient failures are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReasoningError::Timeout | ReasoningError::RateLimited)
    }

    /// Stable tag recorded as a category's failure reason.
    pub fn kind(&self) -> &'static str {
        match self {
            ReasoningError::Timeout => "Timeout",
            ReasoningError::RateLimited => "RateLimited",
            ReasoningError::Unavailable(_) => "Unavailable",
            ReasoningError::InvalidResponse(_) => "InvalidResponse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status transition {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: AnalysisStatus,
    pub to: AnalysisStatus,
}
