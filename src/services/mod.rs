//! Stateless upstream proxies used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the upstream contracts (request shapes, output
//! selection, fixed fallback strings) so route handlers stay focused on
//! protocol translation and rate limiting.

pub mod assistant;
pub mod execution;
