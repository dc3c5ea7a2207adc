//! Common utilities for membench
//!
//! Shared code used across all membench crates.

pub mod error;
pub mod pace;
pub mod retry;

pub use error::{Error, Result};
pub use pace::Pacer;
pub use retry::{RetryError, RetryPolicy, Retryable};
