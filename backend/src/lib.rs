//! Two-player chess session relay.
//!
//! Holds authoritative board state per session, validates moves
//! server-side through the position engine, and propagates state to
//! clients via polling and a best-effort WebSocket push channel.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod relay;
pub mod store;
