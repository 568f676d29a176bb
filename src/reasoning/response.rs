//! Structural validation of model output.
//!
//! Model text must contain a JSON object of the expected shape. Anything else
//! is rejected as [`ReasoningError::InvalidResponse`].

use crate::error::ReasoningError;
use crate::reasoning::{CategoryFindings, OverallFindings};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawCategoryFindings {
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    recommendations: Vec<String>,
    #[serde(alias = "summary")]
    analysis_summary: String,
}

#[derive(Debug, Deserialize)]
struct RawOverallFindings {
    #[serde(alias = "summary")]
    overall_summary: String,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    priority_areas: Vec<String>,
}

/// Locate the outermost `{...}` span in free-form text.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn decode<T: DeserializeOwned>(content: &str) -> Result<T, ReasoningError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ReasoningError::InvalidResponse("empty response".to_string()));
    }

    match serde_json::from_str::<T>(trimmed) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let candidate = extract_json_object(trimmed).ok_or_else(|| {
                ReasoningError::InvalidResponse(format!("no JSON object found: {}", first_err))
            })?;
            serde_json::from_str::<T>(candidate)
                .map_err(|e| ReasoningError::InvalidResponse(e.to_string()))
        }
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validate a category response.
pub fn parse_category_findings(
    content: &str,
    tokens_used: u64,
) -> Result<CategoryFindings, ReasoningError> {
    let raw: RawCategoryFindings = decode(content)?;

    let summary = raw.analysis_summary.trim().to_string();
    if summary.is_empty() {
        return Err(ReasoningError::InvalidResponse(
            "analysis_summary is empty".to_string(),
        ));
    }

    Ok(CategoryFindings {
        strengths: clean_list(raw.strengths),
        weaknesses: clean_list(raw.weaknesses),
        recommendations: clean_list(raw.recommendations),
        summary,
        tokens_used,
    })
}

/// Validate an overall summary response.
pub fn parse_overall_findings(
    content: &str,
    tokens_used: u64,
) -> Result<OverallFindings, ReasoningError> {
    let raw: RawOverallFindings = decode(content)?;

    let summary = raw.overall_summary.trim().to_string();
    if summary.is_empty() {
        return Err(ReasoningError::InvalidResponse(
            "overall_summary is empty".to_string(),
        ));
    }

    Ok(OverallFindings {
        summary,
        key_insights: clean_list(raw.key_insights),
        priority_areas: clean_list(raw.priority_areas),
        tokens_used,
    })
}
