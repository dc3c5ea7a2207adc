//! Provider error taxonomy

use common::Retryable;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Response(String),

    #[error("unknown provider: {0}")]
    Unknown(String),
}

impl Retryable for ProviderError {
    /// Rate limits, server-side failures, and transport glitches are
    /// transient; credential and shape problems are not.
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Transport(_) => true,
            _ => false,
        }
    }
}
