//! # hlx-ws
//!
//! Subscription multiplexing and request correlation over one WebSocket
//! connection to the venue.
//!
//! ## Architecture
//!
//! ```text
//! WsClient ──subscribe/unsubscribe──► Registry (channel key → handler) ─┐
//!    │     ──post──────────────────► PendingRequests (id → oneshot) ────┤ Routes (RwLock)
//!    │                                                                  │
//!    └─ lifecycle Mutex: WsWriter ──► socket ──► WsReader ──► reader task ──► router::dispatch
//! ```
//!
//! - [`client`]: connect / disconnect / subscribe / unsubscribe / post
//! - [`feeds`]: typed subscription helpers
//! - [`router`]: inbound frame routing rules
//! - [`registry`]: subscription handlers
//! - [`pending`]: request correlation table
//! - [`transport`]: WebSocket wrapper
//!
//! Handlers run on the single reader task. A handler that blocks delays every
//! other feed and every post response on the connection.

pub mod client;
pub mod feeds;
pub mod pending;
mod reader;
pub mod registry;
pub mod router;
pub mod transport;

pub use client::{POST_ACTION, POST_INFO, WsClient};
pub use feeds::decoding;
pub use registry::Callback;
