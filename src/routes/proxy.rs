//! Execution and assistant proxy routes.
//!
//! DESIGN
//! ======
//! Both routes always answer with their one-field JSON body. Success is
//! 200; any upstream failure, including an unreadable request body, is 500
//! with the fixed error string; a rate-limited caller gets 429 with the same
//! prefix. Clients are keyed by peer IP address.

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::assistant::{self, ERROR_PREFIX};
use crate::services::execution::{self, EXECUTION_FAILED};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunBody {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunResponse {
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainBody {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplainResponse {
    pub suggestions: String,
}

fn run_reply(status: StatusCode, output: impl Into<String>) -> Response {
    (status, Json(RunResponse { output: output.into() })).into_response()
}

fn explain_reply(status: StatusCode, suggestions: impl Into<String>) -> Response {
    (status, Json(ExplainResponse { suggestions: suggestions.into() })).into_response()
}

/// `POST /api/run` — execute code through the configured runner.
pub async fn run_code(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<RunBody>, JsonRejection>,
) -> Response {
    let client = addr.ip().to_string();
    if let Err(e) = state.run_limiter.check_and_record(&client) {
        warn!(%client, error = %e, "run: rate limited");
        return run_reply(StatusCode::TOO_MANY_REQUESTS, format!("{EXECUTION_FAILED}: {e}"));
    }
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(%client, error = %e, "run: unreadable body");
            return run_reply(StatusCode::INTERNAL_SERVER_ERROR, EXECUTION_FAILED);
        }
    };

    match execution::execute(state.runner.as_deref(), &body.language, &body.code).await {
        Ok(output) => run_reply(StatusCode::OK, output),
        Err(_) => run_reply(StatusCode::INTERNAL_SERVER_ERROR, EXECUTION_FAILED),
    }
}

/// `POST /api/ai` — ask the assistant about a piece of code.
pub async fn explain_code(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<ExplainBody>, JsonRejection>,
) -> Response {
    let client = addr.ip().to_string();
    if let Err(e) = state.ai_limiter.check_and_record(&client) {
        warn!(%client, error = %e, "ai: rate limited");
        return explain_reply(StatusCode::TOO_MANY_REQUESTS, format!("{ERROR_PREFIX}{e}"));
    }
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(%client, error = %e, "ai: unreadable body");
            return explain_reply(StatusCode::INTERNAL_SERVER_ERROR, format!("{ERROR_PREFIX}Unknown error"));
        }
    };

    match assistant::explain(state.llm.as_deref(), &body.code).await {
        Ok(suggestions) => explain_reply(StatusCode::OK, suggestions),
        Err(e) => explain_reply(StatusCode::INTERNAL_SERVER_ERROR, e.user_message()),
    }
}

#[cfg(test)]
#[path = "proxy_test.rs"]
mod tests;
