//! CodeSync — collaborative code rooms over a shared state tree.
//!
//! ARCHITECTURE
//! ============
//! - [`store`]: the push-based shared state tree every participant syncs through
//! - [`room`]: per-participant room session (gate, presence, files, snapshots,
//!   chat, call negotiation) built on [`store::SharedState`]
//! - [`routes`]: HTTP surface and the websocket gateway onto the store
//! - [`services`] + [`llm`]: the execution and assistant proxies

pub mod config;
pub mod frame;
pub mod llm;
pub mod rate_limit;
pub mod room;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
