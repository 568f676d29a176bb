//! Quantitative scoring of answers and categories.
//!
//! All functions here are pure: no I/O, no clocks, no randomness.

use crate::analysis::grouper::CategoryGroup;
use crate::models::{Answer, CategoryScore, Question, QuestionId};
use tracing::debug;

/// Score of one question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerScore {
    pub question_id: QuestionId,
    /// In `[0, question.weight]`.
    pub score: f64,
    pub unanswered: bool,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Effective question weight; negative or non-finite weights count as zero.
pub fn question_weight(question: &Question) -> f64 {
    finite_or_zero(question.weight).max(0.0)
}

/// Score a single question against its answer.
///
/// Choice questions with options use the selected options' weight as a
/// fraction of the question weight, clamped to `[0, max option weight]` and
/// to at most 1. Everything else uses the answer's `answer_weight` clamped to
/// `[0, question.weight]`.
pub fn score(question: &Question, answer: Option<&Answer>) -> AnswerScore {
    let weight = question_weight(question);

    let Some(answer) = answer else {
        return AnswerScore {
            question_id: question.id,
            score: 0.0,
            unanswered: true,
        };
    };

    let score = if question.question_type.is_choice() && !question.options.is_empty() {
        let max_option = question
            .options
            .iter()
            .map(|o| finite_or_zero(o.weight))
            .fold(0.0_f64, f64::max);

        let selected: f64 = answer
            .selected
            .iter()
            .filter_map(|value| {
                let option = question.option(value.trim());
                if option.is_none() {
                    debug!("Question {}: '{}' matches no option", question.id, value);
                }
                option
            })
            .map(|o| finite_or_zero(o.weight))
            .sum();

        let fraction = selected.clamp(0.0, max_option).min(1.0);
        fraction * weight
    } else {
        finite_or_zero(answer.answer_weight).clamp(0.0, weight)
    };

    AnswerScore {
        question_id: question.id,
        score,
        unanswered: false,
    }
}

/// Normalized 0-100 score of a category group.
pub fn category_score(group: &CategoryGroup) -> CategoryScore {
    let mut raw_score = 0.0;
    let mut max_score = 0.0;
    let mut answered = 0;
    let mut unanswered = Vec::new();

    for item in &group.items {
        let result = score(&item.question, item.answer.as_ref());
        raw_score += result.score;
        max_score += question_weight(&item.question);
        if result.unanswered {
            unanswered.push(result.question_id);
        } else {
            answered += 1;
        }
    }

    let no_scorable_questions = max_score <= 0.0;
    let score = if no_scorable_questions {
        0.0
    } else {
        (raw_score / max_score * 100.0).clamp(0.0, 100.0)
    };

    CategoryScore {
        category: group.category.clone(),
        raw_score,
        max_score,
        score,
        answered,
        unanswered,
        no_scorable_questions,
    }
}
