//! Grounding-context assembly
//!
//! Builds the text the answering model is grounded on from provider search
//! results. Providers can return the same underlying passage under several
//! summary memories; duplicates inflate apparent context size and bias the
//! model toward redundant information, so identical chunks collapse to one.

use providers::{SearchChunk, SearchResult};

/// Sentinel an extraction call returns when a context part holds nothing
/// relevant to the question.
pub const NO_RELEVANT_INFO: &str = "NO_RELEVANT_INFORMATION";

/// Canonical answer when no part of an oversized context was informative.
pub const UNKNOWN_ANSWER: &str =
    "I don't have enough information to answer this question.";

/// Context size limits, expressed in tokens and approximated in characters.
#[derive(Debug, Clone)]
pub struct ContextBudget {
    /// Usable context size of the answering model, in tokens.
    pub max_tokens: usize,
    /// Fixed characters-per-token ratio used to approximate token counts.
    pub chars_per_token: usize,
    /// Number of contiguous parts the overflow path splits into.
    pub split_parts: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: 30_000,
            chars_per_token: 4,
            split_parts: 4,
        }
    }
}

impl ContextBudget {
    pub fn max_chars(&self) -> usize {
        self.max_tokens * self.chars_per_token
    }
}

/// Deduplicated, position-ordered grounding text. Derived, never persisted:
/// provider state may change between runs, so it is rebuilt each time.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub chunk_count: usize,
}

impl AssembledContext {
    pub fn estimated_tokens(&self, chars_per_token: usize) -> usize {
        self.text.chars().count() / chars_per_token.max(1)
    }
}

/// Build the grounding context from search results.
///
/// Chunks are deduplicated by exact content (first occurrence wins, and the
/// surviving entry keeps the lowest position seen for that content), then
/// sorted by ascending position. Result summaries form a separate section.
pub fn assemble(results: &[SearchResult]) -> AssembledContext {
    let mut chunks: Vec<SearchChunk> = Vec::new();

    for result in results {
        for chunk in &result.chunks {
            match chunks.iter_mut().find(|c| c.content == chunk.content) {
                Some(existing) => {
                    existing.position = existing.position.min(chunk.position);
                }
                None => chunks.push(chunk.clone()),
            }
        }
    }
    chunks.sort_by_key(|c| c.position);

    let summaries: Vec<&str> = results
        .iter()
        .map(|r| r.content.as_str())
        .filter(|c| !c.is_empty())
        .collect();

    let mut sections = Vec::new();
    if !summaries.is_empty() {
        let lines: Vec<String> = summaries.iter().map(|s| format!("- {}", s)).collect();
        sections.push(format!("Relevant memories:\n{}", lines.join("\n")));
    }
    if !chunks.is_empty() {
        let passages: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        sections.push(format!("Supporting passages:\n{}", passages.join("\n\n")));
    }

    AssembledContext {
        text: sections.join("\n\n"),
        chunk_count: chunks.len(),
    }
}

/// Split text into at most `parts` contiguous, equal-sized pieces.
///
/// Boundaries land on character boundaries, so multi-byte text never splits
/// mid-character.
pub fn split_into_parts(text: &str, parts: usize) -> Vec<String> {
    if parts <= 1 || text.is_empty() {
        return vec![text.to_string()];
    }

    let total_chars = text.chars().count();
    let per_part = total_chars.div_ceil(parts);

    let mut offsets = vec![0usize];
    for (count, (byte_idx, _)) in text.char_indices().enumerate() {
        if count > 0 && count % per_part == 0 {
            offsets.push(byte_idx);
        }
    }
    offsets.push(text.len());

    offsets
        .windows(2)
        .map(|w| text[w[0]..w[1]].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::SearchChunk;

    fn result_with_chunks(chunks: Vec<(&str, i64)>) -> SearchResult {
        SearchResult {
            id: "r".to_string(),
            content: String::new(),
            score: 1.0,
            chunks: chunks
                .into_iter()
                .map(|(content, position)| SearchChunk {
                    content: content.to_string(),
                    position,
                })
                .collect(),
            metadata: None,
        }
    }

    #[test]
    fn identical_chunks_collapse_to_the_lower_position() {
        let results = vec![
            result_with_chunks(vec![("the cat sat", 7), ("other text", 1)]),
            result_with_chunks(vec![("the cat sat", 3)]),
        ];

        let context = assemble(&results);
        assert_eq!(context.chunk_count, 2);
        // The duplicate survives once, ordered by its lower position (3).
        let other_idx = context.text.find("other text").unwrap();
        let cat_idx = context.text.find("the cat sat").unwrap();
        assert!(other_idx < cat_idx);
        assert_eq!(context.text.matches("the cat sat").count(), 1);
    }

    #[test]
    fn chunks_sort_by_ascending_position() {
        let results = vec![result_with_chunks(vec![("c", 9), ("a", 2), ("b", 5)])];
        let context = assemble(&results);
        let order: Vec<usize> = ["a", "b", "c"]
            .iter()
            .map(|s| context.text.find(s).unwrap())
            .collect();
        assert!(order[0] < order[1] && order[1] < order[2]);
    }

    #[test]
    fn summaries_and_passages_form_sections() {
        let mut result = result_with_chunks(vec![("passage text", 0)]);
        result.content = "summary memory".to_string();

        let context = assemble(&[result]);
        assert!(context.text.contains("Relevant memories:\n- summary memory"));
        assert!(context.text.contains("Supporting passages:\npassage text"));
    }

    #[test]
    fn empty_results_yield_empty_context() {
        let context = assemble(&[]);
        assert!(context.text.is_empty());
        assert_eq!(context.chunk_count, 0);
    }

    #[test]
    fn oversized_text_splits_into_exactly_four_parts() {
        let text = "x".repeat(200_000);
        let parts = split_into_parts(&text, 4);
        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| p.len() == 50_000));
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn split_respects_char_boundaries() {
        let text = "é".repeat(10);
        let parts = split_into_parts(&text, 4);
        assert_eq!(parts.concat(), text);
        for part in parts {
            assert!(part.chars().count() <= 3);
        }
    }

    #[test]
    fn short_text_or_single_part_is_not_split() {
        assert_eq!(split_into_parts("abc", 1), vec!["abc".to_string()]);
        assert_eq!(split_into_parts("", 4), vec![String::new()]);
    }

    #[test]
    fn budget_converts_tokens_to_chars() {
        let budget = ContextBudget {
            max_tokens: 30_000,
            chars_per_token: 4,
            split_parts: 4,
        };
        assert_eq!(budget.max_chars(), 120_000);
    }
}
