//! LLM client abstraction for membench
//!
//! Provides a unified chat-completion interface used by the answering and
//! judging engines. The two engines may run different models against the
//! same credentials, so the model is a per-client setting.

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (currently only "openai")
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model to use for chat completions
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (optional if using env var)
    pub api_key: Option<String>,
    /// Base URL override (for custom endpoints)
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
        }
    }
}

/// A message in a chat conversation
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat completion surface consumed by the pipeline engines.
///
/// Implemented by [`LlmClient`]; tests substitute scripted backends so the
/// pipeline can run without network access.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Single-turn completion with a system prompt and a user message.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Model identifier recorded alongside evaluation output.
    fn model(&self) -> &str;
}

/// LLM client backed by the OpenAI-compatible chat API
pub struct LlmClient {
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    /// Build a client from environment variables.
    ///
    /// Requires `OPENAI_API_KEY`; honors `OPENAI_BASE_URL` for custom
    /// endpoints. Fails before any phase runs when the key is absent.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY is not set")?;
        let base_url = std::env::var("OPENAI_BASE_URL").ok();

        Ok(Self::new(LlmConfig {
            api_key: Some(api_key),
            base_url,
            ..LlmConfig::default()
        }))
    }

    /// Override the chat model, keeping credentials unchanged.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Generate a chat completion
    pub async fn chat(&self, messages: Vec<Message>) -> Result<String> {
        match self.config.provider.as_str() {
            "openai" => self.chat_openai(messages).await,
            provider => anyhow::bail!("Unsupported LLM provider: {}", provider),
        }
    }

    async fn chat_openai(&self, messages: Vec<Message>) -> Result<String> {
        let mut openai_config = OpenAIConfig::new();

        if let Some(api_key) = &self.config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }

        if let Some(base_url) = &self.config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let client = OpenAIClient::with_config(openai_config);

        let openai_messages: Vec<ChatCompletionRequestMessage> = messages
            .into_iter()
            .map(|msg| match msg.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .unwrap()
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .unwrap()
                    .into(),
            })
            .collect();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(openai_messages)
            .build()
            .context("Failed to build chat completion request")?;

        let response = client
            .chat()
            .create(request)
            .await
            .context("Failed to create chat completion")?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }

    /// Get the configured provider name
    pub fn provider(&self) -> &str {
        &self.config.provider
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat(vec![Message::system(system), Message::user(user)])
            .await
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
