use super::*;
use crate::frame::ErrorCode;
use crate::llm::types::ChatResponse;
use std::sync::Mutex;

// =========================================================================
// MockLlm
// =========================================================================

struct MockLlm {
    response: Mutex<Option<Result<ChatResponse, LlmError>>>,
    seen: Mutex<Vec<(u32, String, Vec<Message>)>>,
}

impl MockLlm {
    fn returning(response: Result<ChatResponse, LlmError>) -> Self {
        Self { response: Mutex::new(Some(response)), seen: Mutex::new(Vec::new()) }
    }

    fn text(content: Option<&str>) -> Self {
        Self::returning(Ok(ChatResponse {
            content: content.map(str::to_owned),
            model: "mock".into(),
            stop_reason: "end_turn".into(),
            ..Default::default()
        }))
    }
}

#[async_trait::async_trait]
impl LlmChat for MockLlm {
    async fn chat(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<ChatResponse, LlmError> {
        self.seen
            .lock()
            .unwrap()
            .push((max_tokens, system.to_owned(), messages.to_vec()));
        self.response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(ChatResponse::default()))
    }
}

// =========================================================================
// explain
// =========================================================================

#[tokio::test]
async fn explain_sends_tutor_prompt() {
    let llm = MockLlm::text(Some("It prints hello."));
    let out = explain(Some(&llm), "print('hello')").await.unwrap();
    assert_eq!(out, "It prints hello.");

    let seen = llm.seen.lock().unwrap();
    let (max_tokens, system, messages) = &seen[0];
    assert_eq!(*max_tokens, 800);
    assert!(system.starts_with("You are an expert programming tutor."));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, "user");
    assert_eq!(
        messages[0].content,
        "Here is some code:\n\nprint('hello')\n\nExplain what it does, find bugs, and suggest improvements."
    );
}

#[tokio::test]
async fn missing_content_falls_back() {
    let llm = MockLlm::text(None);
    assert_eq!(explain(Some(&llm), "x").await.unwrap(), NO_RESPONSE);

    let llm = MockLlm::text(Some(""));
    assert_eq!(explain(Some(&llm), "x").await.unwrap(), "No AI response.");
}

#[tokio::test]
async fn provider_error_message_is_surfaced() {
    let llm = MockLlm::returning(Err(LlmError::ApiResponse {
        status: 401,
        body: r#"{"error":{"message":"Invalid API Key"}}"#.into(),
    }));
    let err = explain(Some(&llm), "x").await.unwrap_err();
    assert_eq!(err.user_message(), "AI Error: Invalid API Key");
    assert_eq!(err.error_code(), "E_LLM_ERROR");
}

#[tokio::test]
async fn transport_error_is_unknown() {
    let llm = MockLlm::returning(Err(LlmError::ApiRequest("connection reset".into())));
    let err = explain(Some(&llm), "x").await.unwrap_err();
    assert_eq!(err.user_message(), "AI Error: Unknown error");
    assert!(err.retryable());
}

#[tokio::test]
async fn unconfigured_assistant_errors() {
    let err = explain(None, "x").await.unwrap_err();
    assert!(matches!(err, AssistantError::NotConfigured));
    assert_eq!(err.user_message(), "AI Error: Unknown error");
}
