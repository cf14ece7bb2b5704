//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the in-process shared state tree, a registry connection for
//! room bookkeeping, the optional upstream clients behind the two proxies
//! and one rate limiter per proxy. Cloning is cheap; every field is shared.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::llm::LlmChat;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::room::RoomRegistry;
use crate::services::execution::CodeRunner;
use crate::store::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    /// The tree every websocket connection reads and writes.
    pub store: MemoryStore,
    /// Server-side handle for room creation and password checks.
    pub rooms: RoomRegistry,
    /// Optional LLM client. `None` if LLM config is missing.
    pub llm: Option<Arc<dyn LlmChat>>,
    /// Optional code runner. `None` if execution config is missing.
    pub runner: Option<Arc<dyn CodeRunner>>,
    pub run_limiter: RateLimiter,
    pub ai_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: ServerConfig,
        llm: Option<Arc<dyn LlmChat>>,
        runner: Option<Arc<dyn CodeRunner>>,
        limits: RateLimitConfig,
    ) -> Self {
        let store = MemoryStore::new();
        let rooms = RoomRegistry::new(Arc::new(store.connect()));
        Self {
            store,
            rooms,
            llm,
            runner,
            run_limiter: RateLimiter::new(limits),
            ai_limiter: RateLimiter::new(limits),
            config: Arc::new(config),
        }
    }
}
