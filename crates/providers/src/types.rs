//! Canonical search types
//!
//! Every backend normalizes its own wire format into these shapes, so
//! downstream components never see provider identity.

use serde::{Deserialize, Serialize};

/// One passage returned by a provider search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Provider-assigned identifier for the underlying memory/document.
    pub id: String,
    /// Summary or memory text for this result.
    pub content: String,
    /// Relevance score as reported by the backend.
    pub score: f64,
    /// Supporting passages with an ordering position. Backends without
    /// chunking return a single chunk at position 0.
    #[serde(default)]
    pub chunks: Vec<SearchChunk>,
    /// Temporal context, when the backend tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

/// A passage fragment with its ordering position within the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchChunk {
    pub content: String,
    pub position: i64,
}

/// Temporal context fields attached to a search result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Date the source document/session was authored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_date: Option<String>,
    /// Dates of events the passage describes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_dates: Vec<String>,
}

/// Search parameters shared by all backends.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results to return.
    pub limit: usize,
    /// Minimum relevance score, where the backend supports one.
    pub threshold: Option<f64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: None,
        }
    }
}

/// Ingest parameters shared by all backends.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Date the content was authored (conversation session date).
    pub document_date: Option<String>,
}
