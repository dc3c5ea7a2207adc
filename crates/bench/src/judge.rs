//! LLM judging of candidate answers
//!
//! Scores a candidate against ground truth with a category-specific grading
//! rubric. Judge models are unreliable free-text emitters; the verdict
//! parser falls through a chain of salvage attempts and always lands on a
//! definite verdict, so no judge output can ever sink a batch.

use std::sync::Arc;

use llm::ChatBackend;
use serde_json::Value;
use tracing::warn;

use datasets::{DatasetItem, QuestionCategory};

use crate::record::JudgeLabel;

const JUDGE_SYSTEM_PROMPT: &str = "You are grading answers produced by a memory system against ground truth. \
Respond with JSON only, in this exact shape:\n\
{\"label\": \"CORRECT\" or \"WRONG\", \"reasoning\": \"one sentence\"}";

/// A definite verdict with the judge's explanation (or the raw judge text,
/// when nothing better could be salvaged).
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub label: JudgeLabel,
    pub explanation: String,
}

pub struct JudgeEngine {
    llm: Arc<dyn ChatBackend>,
}

impl JudgeEngine {
    pub fn new(llm: Arc<dyn ChatBackend>) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Grade one answer. A failed judge call resolves to a conservative
    /// negative verdict rather than an error.
    pub async fn judge(&self, item: &DatasetItem, answer: &str) -> JudgeOutcome {
        let prompt = build_judge_prompt(item, answer);
        match self.llm.complete(JUDGE_SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => parse_verdict(&raw),
            Err(e) => {
                warn!("Judge call failed for item {}: {}", item.id, e);
                JudgeOutcome {
                    label: JudgeLabel::Wrong,
                    explanation: format!("judge call failed: {}", e),
                }
            }
        }
    }
}

fn build_judge_prompt(item: &DatasetItem, answer: &str) -> String {
    let truth_heading = match item.category {
        QuestionCategory::Preference => "GRADING RUBRIC",
        _ => "GROUND TRUTH",
    };

    format!(
        "QUESTION: {}\n\n{}: {}\n\nCANDIDATE ANSWER: {}\n\n{}",
        item.question,
        truth_heading,
        item.answer,
        answer,
        grading_instruction(item.category)
    )
}

/// The four grading variants, keyed by question category.
fn grading_instruction(category: QuestionCategory) -> &'static str {
    match category {
        QuestionCategory::TemporalReasoning => {
            "This is a temporal reasoning question. Tolerate small counting slips: \
             an answer off by one day, week, or month from the ground truth still \
             counts as CORRECT if the reasoning clearly refers to the right events."
        }
        QuestionCategory::KnowledgeUpdate => {
            "The conversation history contains information that was later superseded. \
             The answer is CORRECT if it states the correct final answer, even if it \
             also mentions the outdated information."
        }
        QuestionCategory::Preference => {
            "Grade against the rubric of desired behavior rather than a single correct \
             string. The answer is CORRECT if it satisfies what the rubric asks for."
        }
        QuestionCategory::SingleSession
        | QuestionCategory::MultiSession
        | QuestionCategory::Abstention => {
            "The answer is CORRECT only if it contains the ground truth or is clearly \
             equivalent to it. Otherwise it is WRONG."
        }
    }
}

/// Extract a definite verdict from raw judge output.
///
/// Fallback chain: (1) parse the first balanced `{...}` substring as JSON
/// and read `label`; (2) search for the literal `"label": "CORRECT"`
/// fragments; (3) accept text containing CORRECT but not WRONG; (4) default
/// to WRONG, keeping the raw text as the explanation.
pub fn parse_verdict(raw: &str) -> JudgeOutcome {
    if let Some(json) = extract_json_object(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(json) {
            let label = value.get("label");
            let correct = matches!(label, Some(Value::String(s)) if s == "CORRECT")
                || label.and_then(Value::as_i64) == Some(1);
            let explanation = value
                .get("reasoning")
                .or_else(|| value.get("explanation"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| raw.trim().to_string());

            return JudgeOutcome {
                label: if correct {
                    JudgeLabel::Correct
                } else {
                    JudgeLabel::Wrong
                },
                explanation,
            };
        }
    }

    if raw.contains(r#""label": "CORRECT""#) || raw.contains(r#""label":"CORRECT""#) {
        return JudgeOutcome {
            label: JudgeLabel::Correct,
            explanation: raw.trim().to_string(),
        };
    }

    if raw.contains("CORRECT") && !raw.contains("WRONG") {
        return JudgeOutcome {
            label: JudgeLabel::Correct,
            explanation: raw.trim().to_string(),
        };
    }

    JudgeOutcome {
        label: JudgeLabel::Wrong,
        explanation: raw.trim().to_string(),
    }
}

/// First balanced-looking `{...}` substring, if any. Judges wrap JSON in
/// prose and markdown fences, so scanning beats whole-string parsing.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    for (offset, c) in raw[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_correct_is_positive() {
        let outcome = parse_verdict(r#"{"label":"CORRECT","reasoning":"x"}"#);
        assert_eq!(outcome.label, JudgeLabel::Correct);
        assert_eq!(outcome.explanation, "x");
    }

    #[test]
    fn clean_json_wrong_is_negative() {
        let outcome = parse_verdict(r#"{"label":"WRONG","reasoning":"missing the date"}"#);
        assert_eq!(outcome.label, JudgeLabel::Wrong);
        assert_eq!(outcome.explanation, "missing the date");
    }

    #[test]
    fn numeric_label_one_is_positive() {
        let outcome = parse_verdict(r#"{"label": 1, "reasoning": "matches"}"#);
        assert_eq!(outcome.label, JudgeLabel::Correct);
    }

    #[test]
    fn json_in_markdown_fence_is_salvaged() {
        let raw = "```json\n{\"label\": \"CORRECT\", \"reasoning\": \"exact match\"}\n```";
        let outcome = parse_verdict(raw);
        assert_eq!(outcome.label, JudgeLabel::Correct);
        assert_eq!(outcome.explanation, "exact match");
    }

    #[test]
    fn json_wrapped_in_prose_is_salvaged() {
        let raw = "Here is my verdict: {\"label\": \"WRONG\", \"reasoning\": \"off by a year\"} as requested.";
        let outcome = parse_verdict(raw);
        assert_eq!(outcome.label, JudgeLabel::Wrong);
        assert_eq!(outcome.explanation, "off by a year");
    }

    #[test]
    fn bare_correct_without_wrong_is_positive() {
        let outcome = parse_verdict("CORRECT because the answer names Lisbon.");
        assert_eq!(outcome.label, JudgeLabel::Correct);
    }

    #[test]
    fn correct_alongside_wrong_is_negative() {
        let outcome = parse_verdict("Parts are CORRECT but the date is WRONG.");
        assert_eq!(outcome.label, JudgeLabel::Wrong);
    }

    #[test]
    fn garbage_defaults_to_negative_with_raw_explanation() {
        let outcome = parse_verdict("no idea, sorry!");
        assert_eq!(outcome.label, JudgeLabel::Wrong);
        assert_eq!(outcome.explanation, "no idea, sorry!");
    }

    #[test]
    fn truncated_json_falls_through_to_fragment_search() {
        let raw = r#"{"label": "CORRECT", "reasoning": "the answer"#;
        let outcome = parse_verdict(raw);
        // No balanced object, but the literal fragment matches.
        assert_eq!(outcome.label, JudgeLabel::Correct);
    }

    #[test]
    fn json_with_unexpected_label_is_negative() {
        let outcome = parse_verdict(r#"{"label": "PARTIAL", "reasoning": "half right"}"#);
        assert_eq!(outcome.label, JudgeLabel::Wrong);
    }

    #[test]
    fn preference_prompts_use_the_rubric_heading() {
        let item = DatasetItem {
            id: "q1".to_string(),
            question: "Recommend a restaurant".to_string(),
            answer: "Should suggest vegetarian options".to_string(),
            category: QuestionCategory::Preference,
            question_date: None,
            sessions: vec![],
            session_dates: vec![],
            nominal_length: None,
        };
        let prompt = build_judge_prompt(&item, "Try the vegan place downtown");
        assert!(prompt.contains("GRADING RUBRIC"));
        assert!(prompt.contains("rubric of desired behavior"));
    }
}
