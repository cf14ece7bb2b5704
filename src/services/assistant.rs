//! Assistant service — one-shot code explanation through the LLM.

use tracing::{info, warn};

use crate::llm::LlmChat;
use crate::llm::types::{LlmError, Message};

pub const MAX_TOKENS: u32 = 800;
pub const NO_RESPONSE: &str = "No AI response.";
pub const ERROR_PREFIX: &str = "AI Error: ";
const UNKNOWN_ERROR: &str = "Unknown error";

const SYSTEM_PROMPT: &str = "You are an expert programming tutor. Analyze, debug, and explain code clearly.";

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant not configured")]
    NotConfigured,
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl AssistantError {
    /// User-facing error text: the provider's own message when it sent one.
    #[must_use]
    pub fn user_message(&self) -> String {
        let detail = match self {
            Self::Llm(e) => e.provider_message(),
            Self::NotConfigured => None,
        };
        format!("{ERROR_PREFIX}{}", detail.as_deref().unwrap_or(UNKNOWN_ERROR))
    }
}

impl crate::frame::ErrorCode for AssistantError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_LLM_NOT_CONFIGURED",
            Self::Llm(_) => "E_LLM_ERROR",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Llm(e) if e.retryable())
    }
}

fn user_prompt(code: &str) -> String {
    format!("Here is some code:\n\n{code}\n\nExplain what it does, find bugs, and suggest improvements.")
}

/// Ask the LLM to explain, debug and improve `code`.
///
/// # Errors
///
/// Returns `NotConfigured` without an LLM client, or the client's error.
pub async fn explain(llm: Option<&dyn LlmChat>, code: &str) -> Result<String, AssistantError> {
    let llm = llm.ok_or(AssistantError::NotConfigured)?;
    let messages = [Message::user(user_prompt(code))];
    let response = llm
        .chat(MAX_TOKENS, SYSTEM_PROMPT, &messages)
        .await
        .inspect_err(|e| warn!(error = %e, "assistant: llm call failed"))?;

    info!(
        model = %response.model,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        "assistant: explanation ready"
    );
    Ok(response
        .content
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_RESPONSE.to_string()))
}

#[cfg(test)]
#[path = "assistant_test.rs"]
mod tests;
