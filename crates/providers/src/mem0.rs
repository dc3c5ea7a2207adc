//! Mem0 backend
//!
//! Memory-oriented backend: ingests conversation messages per user, returns
//! a flat list of extracted memories. Depending on API version the search
//! response is either a bare array or wrapped in `results`, and the text
//! field has drifted between `memory`, `content`, and `text`.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::types::{IngestOptions, ResultMetadata, SearchChunk, SearchOptions, SearchResult};
use crate::{ProviderAdapter, ProviderSettings};

const DEFAULT_BASE_URL: &str = "https://api.mem0.ai";
const API_KEY_VAR: &str = "MEM0_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Mem0Provider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Mem0Provider {
    pub fn new(settings: &ProviderSettings) -> Self {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_VAR).ok());
        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(API_KEY_VAR.to_string()))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Token {}", self.key()?))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for Mem0Provider {
    fn name(&self) -> &str {
        "mem0"
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        self.key().map(|_| ())
    }

    async fn ingest(
        &self,
        content: &str,
        container_tag: &str,
        options: &IngestOptions,
    ) -> Result<(), ProviderError> {
        let mut body = json!({
            "messages": [{"role": "user", "content": content}],
            "user_id": container_tag,
        });
        if let Some(date) = &options.document_date {
            body["metadata"] = json!({ "document_date": date });
        }

        self.post("/v1/memories/", body).await.map(|_| ())
    }

    async fn search(
        &self,
        query: &str,
        container_tag: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let body = json!({
            "query": query,
            "filters": { "user_id": container_tag },
            "limit": options.limit,
        });

        let value = self.post("/v2/memories/search/", body).await?;
        let mut results = parse_search_response(&value)?;
        if let Some(threshold) = options.threshold {
            // The search API has no server-side score floor.
            results.retain(|r| r.score >= threshold);
        }
        Ok(results)
    }

    async fn prepare_container(&self, _container_tag: &str) -> Result<(), ProviderError> {
        // Users are created implicitly on first ingest.
        Ok(())
    }

    async fn delete_container(&self, container_tag: &str) -> Result<(), ProviderError> {
        let resp = self
            .client
            .delete(format!("{}/v1/memories/", self.base_url))
            .header("Authorization", format!("Token {}", self.key()?))
            .timeout(REQUEST_TIMEOUT)
            .query(&[("user_id", container_tag)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() && status.as_u16() != 404 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Normalize either response shape (bare array or `results` wrapper) into
/// canonical results.
fn parse_search_response(value: &Value) -> Result<Vec<SearchResult>, ProviderError> {
    let entries = if let Some(array) = value.as_array() {
        array
    } else if let Some(array) = value.get("results").and_then(|r| r.as_array()) {
        array
    } else {
        return Err(ProviderError::Response(
            "expected an array or a `results` wrapper".to_string(),
        ));
    };

    entries.iter().map(parse_result).collect()
}

fn parse_result(entry: &Value) -> Result<SearchResult, ProviderError> {
    let content = entry
        .get("memory")
        .or_else(|| entry.get("content"))
        .or_else(|| entry.get("text"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ProviderError::Response("memory entry has no text field".to_string())
        })?
        .to_string();

    let id = entry
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let score = entry.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);

    let metadata = entry
        .get("created_at")
        .and_then(|v| v.as_str())
        .map(|date| ResultMetadata {
            document_date: Some(date.to_string()),
            event_dates: Vec::new(),
        });

    // Memories are atomic; represent each as its own single chunk.
    Ok(SearchResult {
        id,
        chunks: vec![SearchChunk {
            content: content.clone(),
            position: 0,
        }],
        content,
        score,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array_with_memory_field() {
        let value = serde_json::json!([
            {"id": "m-1", "memory": "Prefers window seats", "score": 0.8},
            {"id": "m-2", "memory": "Lives in Lisbon", "score": 0.6, "created_at": "2023-05-01"},
        ]);

        let results = parse_search_response(&value).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "Prefers window seats");
        assert_eq!(results[0].chunks.len(), 1);
        assert_eq!(
            results[1].metadata.as_ref().unwrap().document_date.as_deref(),
            Some("2023-05-01")
        );
    }

    #[test]
    fn parses_wrapped_results_with_field_fallbacks() {
        let value = serde_json::json!({
            "results": [
                {"id": "m-1", "content": "from content", "score": 0.5},
                {"id": "m-2", "text": "from text", "score": 0.4},
            ]
        });

        let results = parse_search_response(&value).unwrap();
        assert_eq!(results[0].content, "from content");
        assert_eq!(results[1].content, "from text");
    }

    #[test]
    fn entry_without_text_is_a_shape_error() {
        let value = serde_json::json!([{"id": "m-1", "score": 0.5}]);
        assert!(matches!(
            parse_search_response(&value),
            Err(ProviderError::Response(_))
        ));
    }

    #[test]
    fn scalar_response_is_a_shape_error() {
        let value = serde_json::json!("unexpected");
        assert!(parse_search_response(&value).is_err());
    }
}
