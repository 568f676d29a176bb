//! Reading survey submissions from disk.
//!
//! Two layouts are accepted:
//!
//! ```json
//! { "survey": { "id": 1, "title": "...", "questions": [...] }, "answers": [...] }
//! ```
//!
//! and a flat one where the survey fields sit next to `answers`.

use crate::models::{Answer, Question, Survey};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A survey definition together with one respondent's answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySubmission {
    pub survey: Survey,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

#[derive(Debug, Deserialize)]
struct FlatSubmission {
    #[serde(default, alias = "survey_id")]
    id: u64,
    #[serde(alias = "survey_title")]
    title: String,
    #[serde(default, alias = "survey_description")]
    description: Option<String>,
    questions: Vec<Question>,
    #[serde(default)]
    answers: Vec<Answer>,
}

impl From<FlatSubmission> for SurveySubmission {
    fn from(flat: FlatSubmission) -> Self {
        Self {
            survey: Survey {
                id: flat.id,
                title: flat.title,
                description: flat.description,
                questions: flat.questions,
            },
            answers: flat.answers,
        }
    }
}

/// Parse submission JSON in either layout.
pub fn parse_submission(content: &str) -> Result<SurveySubmission> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Submission is not valid JSON")?;

    let submission = if value.get("survey").is_some() {
        serde_json::from_value::<SurveySubmission>(value)
            .context("Invalid submission: expected `survey` and `answers`")?
    } else {
        serde_json::from_value::<FlatSubmission>(value)
            .context("Invalid submission: expected `title`, `questions` and `answers`")?
            .into()
    };

    debug!(
        "Parsed survey {} with {} questions and {} answers",
        submission.survey.id,
        submission.survey.questions.len(),
        submission.answers.len()
    );

    Ok(submission)
}

/// Load a submission file.
pub fn load_submission(path: &Path) -> Result<SurveySubmission> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read submission file: {}", path.display()))?;

    parse_submission(&content)
        .with_context(|| format!("Failed to parse submission file: {}", path.display()))
}
