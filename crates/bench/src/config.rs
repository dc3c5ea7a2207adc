//! Runtime configuration
//!
//! Settings come from `config.toml` in the membench config directory with
//! env-var overrides. Everything has a workable default except credentials,
//! which are checked before any phase runs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use common::RetryPolicy;
use directories::ProjectDirs;
use providers::ProviderSettings;
use serde::{Deserialize, Serialize};

use crate::context::ContextBudget;

const APP_NAME: &str = "membench";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    /// Per-provider connection settings, keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Where checkpoints and reports are written.
    pub results_dir: Option<PathBuf>,
    /// Checkpoint save cadence in items. Recovery granularity vs write
    /// amplification; a crash repeats at most this many items.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    /// Delay between consecutive outbound calls, for rate-limit politeness.
    #[serde(default = "default_call_delay_ms")]
    pub call_delay_ms: u64,
    /// Retry attempts per provider call (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles per attempt.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Results requested per search.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Minimum relevance score for search results.
    pub search_threshold: Option<f64>,
    /// Usable context size of the answering model, in tokens.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// Characters-per-token ratio for the character budget approximation.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    /// Parts the overflow path splits an oversized context into.
    #[serde(default = "default_split_parts")]
    pub split_parts: usize,
}

fn default_checkpoint_every() -> usize {
    10
}

fn default_call_delay_ms() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_search_limit() -> usize {
    10
}

fn default_max_context_tokens() -> usize {
    30_000
}

fn default_chars_per_token() -> usize {
    4
}

fn default_split_parts() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            results_dir: None,
            checkpoint_every: default_checkpoint_every(),
            call_delay_ms: default_call_delay_ms(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            search_limit: default_search_limit(),
            search_threshold: None,
            max_context_tokens: default_max_context_tokens(),
            chars_per_token: default_chars_per_token(),
            split_parts: default_split_parts(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub answer_model: Option<String>,
    pub judge_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    /// Connection settings for one backend; empty settings fall back to the
    /// backend's environment variables.
    pub fn provider_settings(&self, name: &str) -> ProviderSettings {
        self.providers
            .get(name)
            .map(|p| ProviderSettings {
                api_key: p.api_key.clone(),
                base_url: p.base_url.clone(),
            })
            .unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.pipeline.max_attempts,
            Duration::from_millis(self.pipeline.retry_base_ms),
        )
    }

    pub fn context_budget(&self) -> ContextBudget {
        ContextBudget {
            max_tokens: self.pipeline.max_context_tokens,
            chars_per_token: self.pipeline.chars_per_token,
            split_parts: self.pipeline.split_parts,
        }
    }

    pub fn call_delay(&self) -> Duration {
        Duration::from_millis(self.pipeline.call_delay_ms)
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("MEMBENCH_CONFIG_PATH") {
        let path = PathBuf::from(path);
        if path.is_dir() {
            return Ok(path);
        } else if let Some(parent) = path.parent() {
            return Ok(parent.to_path_buf());
        }
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let config_file = get_config_file()?;

    if !config_file.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(&config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", config_file.display()))
}

/// Results directory: explicit flag, then config, then env, then ./results.
pub fn resolve_results_dir(config: &Config, flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| config.pipeline.results_dir.clone())
        .or_else(|| std::env::var("MEMBENCH_RESULTS_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("results"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.pipeline.checkpoint_every, 10);
        assert_eq!(config.pipeline.split_parts, 4);
        assert_eq!(config.context_budget().max_chars(), 120_000);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
[pipeline]
checkpoint_every = 25
call_delay_ms = 1000

[models]
judge_model = "gpt-4o"

[providers.mem0]
api_key = "sk-test"
"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.checkpoint_every, 25);
        assert_eq!(config.pipeline.search_limit, 10); // default preserved
        assert_eq!(config.models.judge_model.as_deref(), Some("gpt-4o"));
        assert_eq!(
            config.provider_settings("mem0").api_key.as_deref(),
            Some("sk-test")
        );
        assert!(config.provider_settings("supermemory").api_key.is_none());
    }
}
