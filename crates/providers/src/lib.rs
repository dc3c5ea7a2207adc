//! Memory-provider adapters
//!
//! Uniform capability surface over heterogeneous memory backends. Each
//! adapter is a pure translation layer: it shapes requests for one backend
//! and normalizes that backend's responses into the canonical
//! [`SearchResult`]. Adapters never retry; the pipeline wraps every call in
//! its own retry policy so backoff behavior stays centralized and testable.

mod error;
mod mem0;
mod supermemory;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use error::ProviderError;
pub use mem0::Mem0Provider;
pub use supermemory::SupermemoryProvider;
pub use types::{IngestOptions, ResultMetadata, SearchChunk, SearchOptions, SearchResult};

/// Connection settings for one backend.
///
/// A missing `api_key` falls back to the backend's environment variable;
/// [`ProviderAdapter::initialize`] fails if neither is present.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Capability contract every memory backend implements.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short name used in checkpoints and reports.
    fn name(&self) -> &str;

    /// Verify required credentials before any phase runs.
    async fn initialize(&self) -> Result<(), ProviderError>;

    /// Store one document under the container tag.
    async fn ingest(
        &self,
        content: &str,
        container_tag: &str,
        options: &IngestOptions,
    ) -> Result<(), ProviderError>;

    /// Retrieve passages relevant to the query, scoped to the container tag.
    async fn search(
        &self,
        query: &str,
        container_tag: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ProviderError>;

    /// Create or reset the namespace for one (item, run) pair.
    async fn prepare_container(&self, container_tag: &str) -> Result<(), ProviderError>;

    /// Remove the namespace and everything ingested under it.
    async fn delete_container(&self, container_tag: &str) -> Result<(), ProviderError>;
}

/// Names of the built-in backends, in `create_provider` order.
pub const PROVIDER_NAMES: &[&str] = &["supermemory", "mem0"];

/// Construct a backend by name.
///
/// The orchestrator receives the adapter instance through this factory at
/// the call site; there is no ambient registry.
pub fn create_provider(
    name: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
    match name {
        "supermemory" => Ok(Arc::new(SupermemoryProvider::new(settings))),
        "mem0" => Ok(Arc::new(Mem0Provider::new(settings))),
        other => Err(ProviderError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_known_providers() {
        for name in PROVIDER_NAMES {
            let provider = create_provider(name, &ProviderSettings::default()).unwrap();
            assert_eq!(provider.name(), *name);
        }
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let err = match create_provider("nonesuch", &ProviderSettings::default()) {
            Err(e) => e,
            Ok(_) => panic!("expected error for unknown provider"),
        };
        assert!(matches!(err, ProviderError::Unknown(_)));
    }
}
