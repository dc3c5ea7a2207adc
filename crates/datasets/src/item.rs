//! Benchmark input units
//!
//! A [`DatasetItem`] is the immutable unit the pipeline works through:
//! one question, its ground truth, and the source material a provider must
//! ingest before the question is answerable.

use serde::{Deserialize, Serialize};

/// Question categories that select grading behavior downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionCategory {
    /// Recall a fact from a single session.
    SingleSession,
    /// Synthesize information across sessions.
    MultiSession,
    /// Time-dependent questions; grading tolerates small counting slips.
    TemporalReasoning,
    /// The haystack contains superseded facts; only the final state counts.
    KnowledgeUpdate,
    /// Graded against a rubric of desired behavior, not one correct string.
    Preference,
    /// The correct behavior is declining to answer.
    Abstention,
}

impl QuestionCategory {
    /// Classify a raw `question_type` string from the dataset.
    pub fn from_question_type(qt: &str) -> Self {
        let qt = qt.to_lowercase();
        if qt.ends_with("_abs") || qt == "abstention" {
            QuestionCategory::Abstention
        } else if qt.contains("preference") {
            QuestionCategory::Preference
        } else if qt.contains("knowledge-update") || qt.contains("knowledge_update") {
            QuestionCategory::KnowledgeUpdate
        } else if qt.contains("temporal") {
            QuestionCategory::TemporalReasoning
        } else if qt.contains("multi-session") || qt.contains("multi_session") {
            QuestionCategory::MultiSession
        } else {
            QuestionCategory::SingleSession
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionCategory::SingleSession => "single-session",
            QuestionCategory::MultiSession => "multi-session",
            QuestionCategory::TemporalReasoning => "temporal-reasoning",
            QuestionCategory::KnowledgeUpdate => "knowledge-update",
            QuestionCategory::Preference => "preference",
            QuestionCategory::Abstention => "abstention",
        }
    }
}

/// One turn of a recorded conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// One benchmark question with its ingestable source material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetItem {
    pub id: String,
    pub question: String,
    /// Ground-truth answer (or grading rubric, for preference questions).
    pub answer: String,
    pub category: QuestionCategory,
    /// Date the question is asked, for time-dependent questions.
    pub question_date: Option<String>,
    /// Conversation sessions to ingest, in chronological order.
    pub sessions: Vec<Vec<ConversationTurn>>,
    /// Date of each session, parallel to `sessions` where known.
    pub session_dates: Vec<String>,
    /// Nominal context-length bucket (tokens) for degradation benchmarks.
    pub nominal_length: Option<usize>,
}

impl DatasetItem {
    /// Render each session as one ingestable document with its date.
    ///
    /// Turns are joined as `role: content` lines, which keeps speaker
    /// attribution visible to providers that extract facts per speaker.
    pub fn documents(&self) -> Vec<(String, Option<&str>)> {
        self.sessions
            .iter()
            .enumerate()
            .map(|(i, session)| {
                let text = session
                    .iter()
                    .map(|turn| format!("{}: {}", turn.role, turn.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                (text, self.session_dates.get(i).map(String::as_str))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_question_types() {
        assert_eq!(
            QuestionCategory::from_question_type("temporal-reasoning"),
            QuestionCategory::TemporalReasoning
        );
        assert_eq!(
            QuestionCategory::from_question_type("knowledge-update"),
            QuestionCategory::KnowledgeUpdate
        );
        assert_eq!(
            QuestionCategory::from_question_type("single-session-preference"),
            QuestionCategory::Preference
        );
        assert_eq!(
            QuestionCategory::from_question_type("multi-session"),
            QuestionCategory::MultiSession
        );
        assert_eq!(
            QuestionCategory::from_question_type("single-session-user_abs"),
            QuestionCategory::Abstention
        );
        assert_eq!(
            QuestionCategory::from_question_type("single-session-assistant"),
            QuestionCategory::SingleSession
        );
    }

    #[test]
    fn documents_join_turns_with_roles_and_dates() {
        let item = DatasetItem {
            id: "q1".to_string(),
            question: "Where does the user live?".to_string(),
            answer: "Lisbon".to_string(),
            category: QuestionCategory::SingleSession,
            question_date: None,
            sessions: vec![vec![
                ConversationTurn {
                    role: "user".to_string(),
                    content: "I moved to Lisbon".to_string(),
                },
                ConversationTurn {
                    role: "assistant".to_string(),
                    content: "Nice!".to_string(),
                },
            ]],
            session_dates: vec!["2023-05-01".to_string()],
            nominal_length: None,
        };

        let docs = item.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, "user: I moved to Lisbon\nassistant: Nice!");
        assert_eq!(docs[0].1, Some("2023-05-01"));
    }
}
