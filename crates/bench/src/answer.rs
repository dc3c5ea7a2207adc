//! Candidate-answer generation
//!
//! Produces a free-text answer from a question and its assembled context.
//! A model-call failure yields a literal error marker instead of an error:
//! a missing answer would force special cases into every aggregate
//! statistic, while a recorded wrong answer flows through them unchanged.

use std::sync::Arc;

use llm::ChatBackend;
use tracing::warn;

use datasets::{DatasetItem, QuestionCategory};

use crate::context::{
    split_into_parts, AssembledContext, ContextBudget, NO_RELEVANT_INFO, UNKNOWN_ANSWER,
};

/// Returned in place of an answer when generation fails outright.
pub const ANSWER_ERROR_MARKER: &str = "ERROR: failed to generate an answer";

const ANSWER_SYSTEM_PROMPT: &str = "You answer questions about a user using only the provided memories. \
Be direct and specific. Keep the answer short, at most a few dozen words. \
If the memories do not contain the answer, say so.";

const EXTRACT_SYSTEM_PROMPT: &str = "You will receive a question and an excerpt of retrieved memories. \
Extract only the information from the excerpt that is relevant to answering the question, \
stated concisely. If the excerpt contains nothing relevant, reply with exactly: NO_RELEVANT_INFORMATION";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You will receive a question and several partial notes extracted from \
different parts of a long context. Merge them into one concise answer to the question, \
at most a few dozen words.";

/// Generates candidate answers, handling oversized contexts by splitting
/// into parts, extracting per part, and synthesizing the survivors. Worst
/// case model calls per question: parts + 1.
pub struct AnsweringEngine {
    llm: Arc<dyn ChatBackend>,
    budget: ContextBudget,
}

impl AnsweringEngine {
    pub fn new(llm: Arc<dyn ChatBackend>, budget: ContextBudget) -> Self {
        Self { llm, budget }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Generate an answer. Never fails; failures surface as the error
    /// marker and get judged as wrong downstream.
    pub async fn answer(&self, item: &DatasetItem, context: &AssembledContext) -> String {
        if context.text.len() <= self.budget.max_chars() {
            return self.direct_answer(item, &context.text).await;
        }
        self.overflow_answer(item, &context.text).await
    }

    async fn direct_answer(&self, item: &DatasetItem, context_text: &str) -> String {
        let prompt = build_answer_prompt(item, context_text);
        match self.llm.complete(ANSWER_SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!("Answer generation failed for item {}: {}", item.id, e);
                ANSWER_ERROR_MARKER.to_string()
            }
        }
    }

    async fn overflow_answer(&self, item: &DatasetItem, context_text: &str) -> String {
        let parts = split_into_parts(context_text, self.budget.split_parts);
        tracing::info!(
            "Context for item {} exceeds budget ({} chars); splitting into {} parts",
            item.id,
            context_text.len(),
            parts.len()
        );

        let mut extracts = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let prompt = format!("QUESTION: {}\n\nEXCERPT:\n{}", item.question, part);
            match self.llm.complete(EXTRACT_SYSTEM_PROMPT, &prompt).await {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() && !text.contains(NO_RELEVANT_INFO) {
                        extracts.push(text.to_string());
                    }
                }
                Err(e) => {
                    // A failed extraction degrades to "nothing relevant here".
                    warn!(
                        "Extraction failed for item {} part {}: {}",
                        item.id,
                        i + 1,
                        e
                    );
                }
            }
        }

        match extracts.len() {
            0 => UNKNOWN_ANSWER.to_string(),
            1 => extracts.remove(0),
            _ => self.synthesize(item, &extracts).await,
        }
    }

    async fn synthesize(&self, item: &DatasetItem, extracts: &[String]) -> String {
        let notes: Vec<String> = extracts
            .iter()
            .enumerate()
            .map(|(i, e)| format!("NOTE {}:\n{}", i + 1, e))
            .collect();
        let prompt = format!(
            "QUESTION: {}\n\n{}",
            item.question,
            notes.join("\n\n")
        );

        match self.llm.complete(SYNTHESIS_SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!("Synthesis failed for item {}: {}", item.id, e);
                ANSWER_ERROR_MARKER.to_string()
            }
        }
    }
}

fn build_answer_prompt(item: &DatasetItem, context_text: &str) -> String {
    let mut prompt = String::new();

    if let Some(date) = &item.question_date {
        prompt.push_str(&format!("TODAY'S DATE: {}\n\n", date));
    }
    prompt.push_str(&format!("QUESTION: {}\n\n", item.question));
    prompt.push_str(&format!("MEMORIES:\n{}\n", context_text));

    let instruction = category_instruction(item.category);
    if !instruction.is_empty() {
        prompt.push_str(&format!("\n{}", instruction));
    }

    prompt
}

fn category_instruction(category: QuestionCategory) -> &'static str {
    match category {
        QuestionCategory::TemporalReasoning => {
            "Pay close attention to dates. When asked how long ago or how many \
             days/weeks/months, compute from the dates in the memories and today's date."
        }
        QuestionCategory::KnowledgeUpdate => {
            "The memories may contain outdated information that was later corrected. \
             Answer with the most recent state."
        }
        QuestionCategory::Preference => {
            "Answer in a way consistent with the preferences the user has expressed \
             in the memories."
        }
        QuestionCategory::Abstention => {
            "If the memories do not contain the information needed, say you don't \
             know rather than guessing."
        }
        QuestionCategory::SingleSession | QuestionCategory::MultiSession => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend that replays scripted responses and counts calls.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("unscripted".to_string()))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn item() -> DatasetItem {
        DatasetItem {
            id: "q1".to_string(),
            question: "Where does the user live?".to_string(),
            answer: "Lisbon".to_string(),
            category: QuestionCategory::SingleSession,
            question_date: None,
            sessions: vec![],
            session_dates: vec![],
            nominal_length: None,
        }
    }

    fn small_budget() -> ContextBudget {
        ContextBudget {
            max_tokens: 25,
            chars_per_token: 4, // 100-char budget
            split_parts: 4,
        }
    }

    fn oversized_context() -> AssembledContext {
        AssembledContext {
            text: "x".repeat(400),
            chunk_count: 1,
        }
    }

    #[tokio::test]
    async fn small_context_answers_in_one_call() {
        let backend = ScriptedBackend::new(vec![Ok("Lisbon".to_string())]);
        let engine = AnsweringEngine::new(backend.clone(), small_budget());

        let context = AssembledContext {
            text: "user: I live in Lisbon".to_string(),
            chunk_count: 1,
        };
        let answer = engine.answer(&item(), &context).await;

        assert_eq!(answer, "Lisbon");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn model_failure_returns_the_error_marker() {
        let backend = ScriptedBackend::new(vec![Err(anyhow::anyhow!("rate limited"))]);
        let engine = AnsweringEngine::new(backend.clone(), small_budget());

        let context = AssembledContext {
            text: "short".to_string(),
            chunk_count: 1,
        };
        let answer = engine.answer(&item(), &context).await;

        assert_eq!(answer, ANSWER_ERROR_MARKER);
    }

    #[tokio::test]
    async fn single_informative_part_skips_synthesis() {
        let backend = ScriptedBackend::new(vec![
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok("The user lives in Lisbon".to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
        ]);
        let engine = AnsweringEngine::new(backend.clone(), small_budget());

        let answer = engine.answer(&item(), &oversized_context()).await;

        assert_eq!(answer, "The user lives in Lisbon");
        // 4 extraction calls, no synthesis call.
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test]
    async fn no_informative_parts_yield_unknown_answer() {
        let backend = ScriptedBackend::new(vec![
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
        ]);
        let engine = AnsweringEngine::new(backend.clone(), small_budget());

        let answer = engine.answer(&item(), &oversized_context()).await;

        assert_eq!(answer, UNKNOWN_ANSWER);
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test]
    async fn multiple_informative_parts_are_synthesized() {
        let backend = ScriptedBackend::new(vec![
            Ok("Moved to Lisbon in May".to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok("Works remotely from Portugal".to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok("Lisbon, since May".to_string()),
        ]);
        let engine = AnsweringEngine::new(backend.clone(), small_budget());

        let answer = engine.answer(&item(), &oversized_context()).await;

        assert_eq!(answer, "Lisbon, since May");
        // 4 extraction calls + 1 synthesis call: the bounded worst case.
        assert_eq!(backend.calls(), 5);
    }

    #[tokio::test]
    async fn failed_extraction_counts_as_uninformative() {
        let backend = ScriptedBackend::new(vec![
            Err(anyhow::anyhow!("timeout")),
            Ok("The user lives in Lisbon".to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
            Ok(NO_RELEVANT_INFO.to_string()),
        ]);
        let engine = AnsweringEngine::new(backend.clone(), small_budget());

        let answer = engine.answer(&item(), &oversized_context()).await;

        assert_eq!(answer, "The user lives in Lisbon");
    }

    #[test]
    fn temporal_prompts_carry_the_question_date() {
        let mut temporal_item = item();
        temporal_item.category = QuestionCategory::TemporalReasoning;
        temporal_item.question_date = Some("2023-06-01".to_string());

        let prompt = build_answer_prompt(&temporal_item, "ctx");
        assert!(prompt.contains("TODAY'S DATE: 2023-06-01"));
        assert!(prompt.contains("attention to dates"));
    }
}
