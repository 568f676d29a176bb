//! Grouping of questions and answers by category.

use crate::models::{Answer, Question, QuestionId, UNCATEGORIZED};
use std::collections::HashMap;
use tracing::warn;

/// A question paired with its answer, if one was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedItem {
    pub question: Question,
    pub answer: Option<Answer>,
}

/// All questions of one category, in `order_index` order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    pub category: String,
    pub items: Vec<GroupedItem>,
}

/// Normalize a category label. Blank labels map to [`UNCATEGORIZED`].
pub fn category_label(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Partition questions into categories.
///
/// Questions are ordered by `order_index` (ties keep input order). Categories
/// appear in the order they are first seen in that sequence.
pub fn group_by_category(questions: &[Question], answers: &[Answer]) -> Vec<CategoryGroup> {
    let mut answer_index: HashMap<QuestionId, &Answer> = HashMap::new();
    for answer in answers {
        if answer_index.contains_key(&answer.question_id) {
            warn!(
                "Duplicate answer for question {}; keeping the first",
                answer.question_id
            );
            continue;
        }
        answer_index.insert(answer.question_id, answer);
    }

    let mut sorted: Vec<&Question> = questions.iter().collect();
    sorted.sort_by_key(|q| q.order_index);

    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for question in sorted {
        let label = category_label(&question.category);
        let position = *positions.entry(label.clone()).or_insert_with(|| {
            groups.push(CategoryGroup {
                category: label,
                items: Vec::new(),
            });
            groups.len() - 1
        });

        groups[position].items.push(GroupedItem {
            question: question.clone(),
            answer: answer_index.get(&question.id).map(|a| (*a).clone()),
        });
    }

    groups
}
