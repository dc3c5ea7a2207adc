//! Per-item result rows accumulated in checkpoints
//!
//! `SearchRecord` rows carry retrieved passages from the search phase into
//! evaluation; `EvaluationRecord` rows are the graded outcomes the report is
//! built from. Both are append-only once written.

use chrono::{DateTime, Utc};
use providers::SearchResult;
use serde::{Deserialize, Serialize};

use datasets::DatasetItem;

use crate::checkpoint::ItemKeyed;

/// Binary judge verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JudgeLabel {
    Correct,
    Wrong,
}

/// Search-phase output for one question.
///
/// A failed search is recorded with empty results and the error message, so
/// the evaluate phase can turn it into an incorrect record instead of the
/// run aborting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    pub item_id: String,
    pub results: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemKeyed for SearchRecord {
    fn item_id(&self) -> &str {
        &self.item_id
    }
}

/// One graded answer for one question under one (answer, judge) model pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question_id: String,
    pub category: String,
    pub question: String,
    pub ground_truth: String,
    pub answer: String,
    pub label: JudgeLabel,
    pub explanation: String,
    /// Estimated tokens of the assembled grounding context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<usize>,
    /// Nominal context-length bucket, for degradation benchmarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_length: Option<usize>,
    /// Estimated actual token count of the test's ingested haystack. May
    /// drift from the nominal bucket due to estimation error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured_length: Option<usize>,
    pub answer_model: String,
    pub judge_model: String,
    pub evaluated_at: DateTime<Utc>,
    /// Failure note when the item could not be evaluated normally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationRecord {
    /// Record an item that failed before it could be judged. Counted as
    /// incorrect so aggregate statistics need no special cases.
    pub fn failed(
        item: &DatasetItem,
        answer_model: &str,
        judge_model: &str,
        error: String,
    ) -> Self {
        Self {
            question_id: item.id.clone(),
            category: item.category.label().to_string(),
            question: item.question.clone(),
            ground_truth: item.answer.clone(),
            answer: String::new(),
            label: JudgeLabel::Wrong,
            explanation: "not judged: item failed earlier in the pipeline".to_string(),
            context_tokens: None,
            nominal_length: item.nominal_length,
            measured_length: None,
            answer_model: answer_model.to_string(),
            judge_model: judge_model.to_string(),
            evaluated_at: Utc::now(),
            error: Some(error),
        }
    }

    pub fn is_correct(&self) -> bool {
        self.label == JudgeLabel::Correct
    }
}

impl ItemKeyed for EvaluationRecord {
    fn item_id(&self) -> &str {
        &self.question_id
    }
}

/// Shorten an error message for logs and failure summaries.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let truncated: String = message.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_messages_alone() {
        assert_eq!(truncate_message("short", 100), "short");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        let long = "é".repeat(50);
        let cut = truncate_message(&long, 10);
        assert_eq!(cut.chars().count(), 13); // 10 chars + "..."
        assert!(cut.ends_with("..."));
    }
}
