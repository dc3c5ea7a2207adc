//! Supermemory backend
//!
//! Document-oriented backend: ingests whole documents, returns summary
//! "memories" with chunk lists. Responses arrive wrapped in a `results`
//! object and chunks carry explicit positions and relevance flags.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::types::{IngestOptions, ResultMetadata, SearchChunk, SearchOptions, SearchResult};
use crate::{ProviderAdapter, ProviderSettings};

const DEFAULT_BASE_URL: &str = "https://api.supermemory.ai";
const API_KEY_VAR: &str = "SUPERMEMORY_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SupermemoryProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SupermemoryProvider {
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
            .bearer_auth(self.key()?)
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
impl ProviderAdapter for SupermemoryProvider {
    fn name(&self) -> &str {
        "supermemory"
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
            "content": content,
            "containerTag": container_tag,
        });
        if let Some(date) = &options.document_date {
            body["metadata"] = json!({ "documentDate": date });
        }

        self.post("/v3/documents", body).await.map(|_| ())
    }

    async fn search(
        &self,
        query: &str,
        container_tag: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let mut body = json!({
            "q": query,
            "containerTag": container_tag,
            "limit": options.limit,
        });
        if let Some(threshold) = options.threshold {
            body["documentThreshold"] = json!(threshold);
        }

        let value = self.post("/v4/search", body).await?;
        parse_search_response(&value)
    }

    async fn prepare_container(&self, _container_tag: &str) -> Result<(), ProviderError> {
        // Containers are created implicitly on first ingest.
        Ok(())
    }

    async fn delete_container(&self, container_tag: &str) -> Result<(), ProviderError> {
        let resp = self
            .client
            .delete(format!(
                "{}/v3/containers/{}",
                self.base_url, container_tag
            ))
            .bearer_auth(self.key()?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        // Deleting a container that never got content is not an error.
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

/// Normalize the wrapped-object search response into canonical results.
fn parse_search_response(value: &Value) -> Result<Vec<SearchResult>, ProviderError> {
    let results = value
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| ProviderError::Response("missing `results` array".to_string()))?;

    Ok(results.iter().map(parse_result).collect())
}

fn parse_result(entry: &Value) -> SearchResult {
    let id = entry
        .get("documentId")
        .or_else(|| entry.get("id"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let content = entry
        .get("summary")
        .or_else(|| entry.get("title"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let score = entry.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);

    let chunks = entry
        .get("chunks")
        .and_then(|c| c.as_array())
        .map(|chunks| {
            chunks
                .iter()
                .enumerate()
                .filter(|(_, chunk)| {
                    // Chunks flagged irrelevant by the backend are dropped here
                    // so the assembler only sees usable passages.
                    chunk
                        .get("isRelevant")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(true)
                })
                .filter_map(|(i, chunk)| {
                    let text = chunk.get("content").and_then(|v| v.as_str())?;
                    Some(SearchChunk {
                        content: text.to_string(),
                        position: chunk
                            .get("position")
                            .and_then(|v| v.as_i64())
                            .unwrap_or(i as i64),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let metadata = entry.get("metadata").map(|m| ResultMetadata {
        document_date: m
            .get("documentDate")
            .and_then(|v| v.as_str())
            .map(String::from),
        event_dates: m
            .get("eventDates")
            .and_then(|v| v.as_array())
            .map(|dates| {
                dates
                    .iter()
                    .filter_map(|d| d.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
    });

    SearchResult {
        id,
        content,
        score,
        chunks,
        metadata,
    }
}
