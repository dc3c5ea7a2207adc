//! Conversational-memory benchmark loader
//!
//! Parses the LongMemEval-style JSON array: each entry is a question over a
//! haystack of dated conversation sessions. Sessions become the documents a
//! provider ingests; the question/answer pair drives evaluation.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::item::{ConversationTurn, DatasetItem, QuestionCategory};

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question_id: String,
    #[serde(default)]
    question_type: String,
    question: String,
    answer: String,
    #[serde(default)]
    question_date: Option<String>,
    #[serde(default)]
    haystack_dates: Vec<String>,
    #[serde(default)]
    haystack_sessions: Vec<Vec<RawTurn>>,
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    role: String,
    content: String,
}

/// Load a conversational benchmark file.
pub fn load(path: &Path, limit: Option<usize>) -> Result<Vec<DatasetItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;
    let items = from_json_str(&content)
        .with_context(|| format!("Failed to parse dataset file: {}", path.display()))?;

    Ok(match limit {
        Some(n) => items.into_iter().take(n).collect(),
        None => items,
    })
}

/// Parse the benchmark JSON array into dataset items.
pub fn from_json_str(json: &str) -> Result<Vec<DatasetItem>> {
    let raw: Vec<RawQuestion> = serde_json::from_str(json)?;

    Ok(raw.into_iter().map(convert).collect())
}

fn convert(raw: RawQuestion) -> DatasetItem {
    DatasetItem {
        id: raw.question_id,
        question: raw.question,
        answer: raw.answer,
        category: QuestionCategory::from_question_type(&raw.question_type),
        question_date: raw.question_date,
        sessions: raw
            .haystack_sessions
            .into_iter()
            .map(|session| {
                session
                    .into_iter()
                    .map(|turn| ConversationTurn {
                        role: turn.role,
                        content: turn.content,
                    })
                    .collect()
            })
            .collect(),
        session_dates: raw.haystack_dates,
        nominal_length: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "question_id": "lme-001",
            "question_type": "temporal-reasoning",
            "question": "How many weeks ago did I adopt my cat?",
            "answer": "Three weeks",
            "question_date": "2023-06-01",
            "haystack_dates": ["2023-05-11", "2023-05-25"],
            "haystack_sessions": [
                [
                    {"role": "user", "content": "I adopted a cat today!"},
                    {"role": "assistant", "content": "Congratulations!"}
                ],
                [
                    {"role": "user", "content": "The cat is settling in."}
                ]
            ]
        },
        {
            "question_id": "lme-002",
            "question_type": "single-session-user",
            "question": "What is my favorite tea?",
            "answer": "Oolong"
        }
    ]"#;

    #[test]
    fn parses_questions_sessions_and_dates() {
        let items = from_json_str(SAMPLE).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.id, "lme-001");
        assert_eq!(first.category, QuestionCategory::TemporalReasoning);
        assert_eq!(first.question_date.as_deref(), Some("2023-06-01"));
        assert_eq!(first.sessions.len(), 2);
        assert_eq!(first.sessions[0].len(), 2);
        assert_eq!(first.session_dates.len(), 2);

        let second = &items[1];
        assert_eq!(second.category, QuestionCategory::SingleSession);
        assert!(second.sessions.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(from_json_str("{not json").is_err());
    }
}
