//! Prompt construction for the reasoning backend.

use crate::analysis::{score, GroupedItem};
use crate::reasoning::{CategoryRequest, SummaryRequest};
use std::fmt::Write;

/// System prompt for per-category analysis.
pub const CATEGORY_SYSTEM_PROMPT: &str = r#"You are an expert performance analyst who reviews survey responses.
You analyze one survey category at a time and describe what the respondent does well,
where they fall short, and what they should do next.

Guidelines:
- Base every statement on the answers provided; weigh questions by their weight.
- Be specific and actionable; keep a professional, constructive tone.
- Respond with a single JSON object and nothing else."#;

/// System prompt for the overall synthesis.
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are an expert performance analyst.
You receive per-category findings from a survey analysis and write an overall verdict:
key findings across categories, the strongest and weakest areas, and prioritized next steps.
Respond with a single JSON object and nothing else."#;

const CATEGORY_RESPONSE_FORMAT: &str = r#"{
  "strengths": ["..."],
  "weaknesses": ["..."],
  "recommendations": ["..."],
  "analysis_summary": "..."
}"#;

const SUMMARY_RESPONSE_FORMAT: &str = r#"{
  "overall_summary": "...",
  "key_insights": ["..."],
  "priority_areas": ["..."]
}"#;

fn push_survey_header(prompt: &mut String, title: &str, description: Option<&str>) {
    let _ = writeln!(prompt, "Survey: {}", title);
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(prompt, "Description: {}", description.trim());
    }
    prompt.push('\n');
}

fn push_item(prompt: &mut String, position: usize, item: &GroupedItem) {
    let question = &item.question;
    let result = score(question, item.answer.as_ref());

    let _ = writeln!(
        prompt,
        "{}. {} [{}; weight {:.2}]",
        position, question.text, question.question_type, question.weight
    );

    if !question.options.is_empty() {
        let options: Vec<String> = question
            .options
            .iter()
            .map(|o| format!("{} = \"{}\" (weight {:.2})", o.value, o.label, o.weight))
            .collect();
        let _ = writeln!(prompt, "   Options: {}", options.join("; "));
    }

    match &item.answer {
        Some(answer) => {
            let _ = writeln!(
                prompt,
                "   Answer: {} (answer weight {:.2}, score {:.2})",
                answer.selected.join(", "),
                answer.answer_weight,
                result.score
            );
        }
        None => prompt.push_str("   Answer: (unanswered)\n"),
    }
}

/// Build the user prompt for one category.
pub fn category_prompt(request: &CategoryRequest<'_>) -> String {
    let mut prompt = String::new();
    push_survey_header(&mut prompt, request.survey_title, request.survey_description);

    let score = request.score;
    let _ = writeln!(prompt, "=== CATEGORY: {} ===", request.group.category);
    let _ = writeln!(
        prompt,
        "Category score: {:.1}/100 ({:.2} of {:.2} weighted points, {} answered, {} unanswered)\n",
        score.score,
        score.raw_score,
        score.max_score,
        score.answered,
        score.unanswered.len()
    );

    prompt.push_str("Questions and answers:\n");
    for (i, item) in request.group.items.iter().enumerate() {
        push_item(&mut prompt, i + 1, item);
    }

    prompt.push_str("\nAnalyze this category only. What patterns emerge, what does the respondent do well, ");
    prompt.push_str("what needs improvement, and which concrete actions would help?\n\n");
    prompt.push_str("Respond with JSON in exactly this shape:\n");
    prompt.push_str(CATEGORY_RESPONSE_FORMAT);
    prompt
}

/// Build the user prompt for the overall synthesis.
pub fn summary_prompt(request: &SummaryRequest<'_>) -> String {
    let mut prompt = String::new();
    push_survey_header(&mut prompt, request.survey_title, request.survey_description);

    let _ = writeln!(prompt, "Per-category findings ({} categories):\n", request.analyses.len());
    for analysis in request.analyses {
        let _ = writeln!(
            prompt,
            "## {} (score {:.1}/100)",
            analysis.category, analysis.category_score.score
        );
        let _ = writeln!(prompt, "Summary: {}", analysis.analysis_summary);
        if !analysis.strengths.is_empty() {
            let _ = writeln!(prompt, "Strengths: {}", analysis.strengths.join("; "));
        }
        if !analysis.weaknesses.is_empty() {
            let _ = writeln!(prompt, "Weaknesses: {}", analysis.weaknesses.join("; "));
        }
        prompt.push('\n');
    }

    prompt.push_str("Write the overall verdict. Highlight the strongest and weakest areas and ");
    prompt.push_str("list the priority areas in order of importance.\n\n");
    prompt.push_str("Respond with JSON in exactly this shape:\n");
    prompt.push_str(SUMMARY_RESPONSE_FORMAT);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{category_score, CategoryGroup};
    use crate::models::{Answer, CategoryAnalysis, Question, QuestionOption, QuestionType};

    fn sample_group() -> CategoryGroup {
        CategoryGroup {
            category: "Planning".to_string(),
            items: vec![
                GroupedItem {
                    question: Question {
                        id: 1,
                        text: "How often do you plan your week?".to_string(),
                        question_type: QuestionType::SingleChoice,
                        category: "Planning".to_string(),
                        weight: 1.0,
                        options: vec![
                            QuestionOption {
                                value: "1".to_string(),
                                label: "Never".to_string(),
                                weight: 0.0,
                            },
                            QuestionOption {
                                value: "2".to_string(),
                                label: "Always".to_string(),
                                weight: 1.0,
                            },
                        ],
                        order_index: 0,
                    },
                    answer: Some(Answer {
                        question_id: 1,
                        selected: vec!["2".to_string()],
                        answer_weight: 1.0,
                    }),
                },
                GroupedItem {
                    question: Question {
                        id: 2,
                        text: "Describe your planning tools".to_string(),
                        question_type: QuestionType::FreeText,
                        category: "Planning".to_string(),
                        weight: 0.5,
                        options: Vec::new(),
                        order_index: 1,
                    },
                    answer: None,
                },
            ],
        }
    }

    #[test]
    fn test_category_prompt_lists_questions_answers_and_score() {
        let group = sample_group();
        let score = category_score(&group);
        let prompt = category_prompt(&CategoryRequest {
            survey_title: "Self assessment",
            survey_description: Some("Annual check-in"),
            group: &group,
            score: &score,
        });

        assert!(prompt.contains("Survey: Self assessment"));
        assert!(prompt.contains("Description: Annual check-in"));
        assert!(prompt.contains("=== CATEGORY: Planning ==="));
        assert!(prompt.contains("2 = \"Always\""));
        assert!(prompt.contains("(unanswered)"));
        assert!(prompt.contains("\"analysis_summary\""));
    }

    #[test]
    fn test_summary_prompt_includes_each_category() {
        let group = sample_group();
        let analyses = vec![CategoryAnalysis {
            category: "Planning".to_string(),
            category_score: category_score(&group),
            strengths: vec!["Plans weekly".to_string()],
            weaknesses: Vec::new(),
            recommendations: Vec::new(),
            analysis_summary: "Organized.".to_string(),
            success: true,
            failure_reason: None,
            tokens_used: 10,
            attempts: 1,
            processing_time: 0.1,
        }];

        let prompt = summary_prompt(&SummaryRequest {
            survey_title: "Self assessment",
            survey_description: None,
            analyses: &analyses,
        });

        assert!(prompt.contains("## Planning"));
        assert!(prompt.contains("Strengths: Plans weekly"));
        assert!(!prompt.contains("Weaknesses:"));
        assert!(!prompt.contains("Description:"));
    }
}
