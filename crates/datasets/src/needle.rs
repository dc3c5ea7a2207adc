//! Long-context degradation benchmark loader
//!
//! Each test embeds a retrievable fact in a haystack sized to a nominal
//! token count. Running the same questions across nominal sizes yields the
//! degradation curve (base score, effective length) in the report.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::item::{ConversationTurn, DatasetItem, QuestionCategory};

#[derive(Debug, Deserialize)]
struct RawTest {
    id: String,
    question: String,
    answer: String,
    /// Nominal context size in tokens for this test.
    context_length: usize,
    #[serde(default)]
    question_date: Option<String>,
    /// Haystack documents; the needle fact is embedded in one of them.
    #[serde(default)]
    haystack: Vec<String>,
}

/// Load a degradation benchmark file.
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

/// Parse the degradation benchmark JSON array into dataset items.
pub fn from_json_str(json: &str) -> Result<Vec<DatasetItem>> {
    let raw: Vec<RawTest> = serde_json::from_str(json)?;

    Ok(raw.into_iter().map(convert).collect())
}

fn convert(raw: RawTest) -> DatasetItem {
    // Each haystack document becomes a single-turn "session" so the ingest
    // path is identical for both benchmark families.
    let sessions = raw
        .haystack
        .into_iter()
        .map(|doc| {
            vec![ConversationTurn {
                role: "document".to_string(),
                content: doc,
            }]
        })
        .collect();

    DatasetItem {
        id: raw.id,
        question: raw.question,
        answer: raw.answer,
        category: QuestionCategory::SingleSession,
        question_date: raw.question_date,
        sessions,
        session_dates: Vec::new(),
        nominal_length: Some(raw.context_length),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "id": "needle-1k-01",
            "question": "What is the access code for the vault?",
            "answer": "7291",
            "context_length": 1000,
            "haystack": ["filler text", "the vault code is 7291", "more filler"]
        },
        {
            "id": "needle-8k-01",
            "question": "What is the access code for the vault?",
            "answer": "7291",
            "context_length": 8000,
            "haystack": ["filler"]
        }
    ]"#;

    #[test]
    fn parses_nominal_lengths_and_haystacks() {
        let items = from_json_str(SAMPLE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].nominal_length, Some(1000));
        assert_eq!(items[0].sessions.len(), 3);
        assert_eq!(items[1].nominal_length, Some(8000));
    }

    #[test]
    fn haystack_documents_become_single_turn_sessions() {
        let items = from_json_str(SAMPLE).unwrap();
        let docs = items[0].documents();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[1].0, "document: the vault code is 7291");
        assert_eq!(docs[1].1, None);
    }
}
