//! LLM — chat-completions adapter behind the code assistant.
//!
//! DESIGN
//! ======
//! Configured from environment variables. Groq and `OpenAI` share the
//! OpenAI-compatible wire format, so `LlmClient` wraps a single
//! [`openai::OpenAiClient`] pointed at the provider's base URL. Callers
//! depend on the [`LlmChat`] trait so tests can substitute a mock.

pub mod config;
pub mod openai;
pub mod types;

use config::LlmConfig;
pub use types::LlmChat;
use types::{ChatResponse, LlmError, Message};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete LLM client for the configured provider.
pub struct LlmClient {
    inner: openai::OpenAiClient,
    model: String,
}

impl LlmClient {
    /// Build an LLM client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env()?;
        Self::from_config(config)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = openai::OpenAiClient::new(config.api_key, &config.base_url)?;
        Ok(Self { inner, model: config.model })
    }

    /// Return the configured model name (e.g. `"llama-3.3-70b-versatile"`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<ChatResponse, LlmError> {
        self.inner
            .chat(&self.model, max_tokens, system, messages)
            .await
    }
}
