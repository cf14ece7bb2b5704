//! Execution service — forwards code to a Judge0-compatible runner.
//!
//! DESIGN
//! ======
//! One synchronous submission per request (`wait=true`). The runner's
//! response carries up to four text fields; the first non-empty one in the
//! order stderr, compile output, message, stdout is what the caller sees.
//! Any failure collapses into a single fixed string at the route. There
//! are no retries and no timeout beyond the transport default.
//!
//! LIMITATIONS
//! ===========
//! Only three language ids are known. Everything that is not `python` or
//! `cpp` runs as the fallback engine, including JavaScript.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const NO_OUTPUT: &str = "No output";
pub const EXECUTION_FAILED: &str = "Error executing code";

pub const DEFAULT_EXECUTION_URL: &str =
    "https://judge0-extra-ce.p.rapidapi.com/submissions?base64_encoded=false&wait=true";
pub const DEFAULT_EXECUTION_HOST: &str = "judge0-extra-ce.p.rapidapi.com";

const PYTHON_ENGINE: u32 = 28;
const CPP_ENGINE: u32 = 2;
const FALLBACK_ENGINE: u32 = 71;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("code execution not configured")]
    NotConfigured,
    #[error("runner request failed: {0}")]
    Request(String),
    #[error("runner returned status {status}")]
    Response { status: u16, body: String },
    #[error("runner response parse failed: {0}")]
    Parse(String),
}

impl crate::frame::ErrorCode for ExecutionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_EXECUTION_NOT_CONFIGURED",
            Self::Request(_) => "E_EXECUTION_REQUEST",
            Self::Response { .. } => "E_EXECUTION_RESPONSE",
            Self::Parse(_) => "E_EXECUTION_PARSE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

/// Result fields of a finished submission. Missing fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmissionRequest<'a> {
    source_code: &'a str,
    language_id: u32,
    stdin: &'a str,
}

/// Anything that can run a program and report its output.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Submit `source` for the given engine and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] if the runner is unreachable or answers
    /// with something other than a submission.
    async fn submit(&self, language_id: u32, source: &str) -> Result<Submission, ExecutionError>;
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub url: String,
    pub host: Option<String>,
    pub api_key: Option<String>,
}

impl ExecutionConfig {
    /// Runner settings from `EXECUTION_URL`, `EXECUTION_HOST` and
    /// `EXECUTION_API_KEY`. `None` when neither a URL nor a key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let url = non_empty("EXECUTION_URL");
        let api_key = non_empty("EXECUTION_API_KEY");
        if url.is_none() && api_key.is_none() {
            return None;
        }
        let host = match non_empty("EXECUTION_HOST") {
            Some(host) => Some(host),
            None if url.is_none() => Some(DEFAULT_EXECUTION_HOST.to_string()),
            None => None,
        };
        Some(Self { url: url.unwrap_or_else(|| DEFAULT_EXECUTION_URL.to_string()), host, api_key })
    }
}

// =============================================================================
// JUDGE0 CLIENT
// =============================================================================

pub struct Judge0Client {
    http: reqwest::Client,
    config: ExecutionConfig,
}

impl Judge0Client {
    /// # Errors
    ///
    /// Returns `Request` if the HTTP client cannot be constructed.
    pub fn new(config: ExecutionConfig) -> Result<Self, ExecutionError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ExecutionError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CodeRunner for Judge0Client {
    async fn submit(&self, language_id: u32, source: &str) -> Result<Submission, ExecutionError> {
        let body = SubmissionRequest { source_code: source, language_id, stdin: "" };
        let mut request = self.http.post(&self.config.url).json(&body);
        if let Some(host) = &self.config.host {
            request = request.header("x-rapidapi-host", host);
        }
        if let Some(key) = &self.config.api_key {
            request = request.header("x-rapidapi-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutionError::Request(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutionError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(ExecutionError::Response { status: status.as_u16(), body: text });
        }
        serde_json::from_str(&text).map_err(|e| ExecutionError::Parse(e.to_string()))
    }
}

// =============================================================================
// EXECUTE
// =============================================================================

/// Engine id for a language name.
#[must_use]
pub fn engine_id(language: &str) -> u32 {
    match language {
        "python" => PYTHON_ENGINE,
        "cpp" => CPP_ENGINE,
        _ => FALLBACK_ENGINE,
    }
}

/// The text shown to the user for a finished submission.
#[must_use]
pub fn pick_output(submission: &Submission) -> String {
    [&submission.stderr, &submission.compile_output, &submission.message, &submission.stdout]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| NO_OUTPUT.to_string())
}

/// Run `code` as `language` and return its user-visible output.
///
/// # Errors
///
/// Returns `NotConfigured` without a runner, or whatever the runner reports.
pub async fn execute(runner: Option<&dyn CodeRunner>, language: &str, code: &str) -> Result<String, ExecutionError> {
    let runner = runner.ok_or(ExecutionError::NotConfigured)?;
    let language_id = engine_id(language);
    let submission = runner.submit(language_id, code).await.inspect_err(|e| {
        warn!(error = %e, %language, "execution: runner failed");
    })?;
    info!(%language, language_id, "execution: submission finished");
    Ok(pick_output(&submission))
}

#[cfg(test)]
#[path = "execution_test.rs"]
mod tests;
