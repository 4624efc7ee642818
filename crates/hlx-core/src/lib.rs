//! # hlx-core
//!
//! Shared building blocks for the Hyperliquid streaming client:
//!
//! - **Types** (`types`): subscription descriptors, wire envelopes, typed feed payloads
//! - **Configuration** (`config`): network selection, endpoint and timeout settings
//! - **Error types** (`error`): domain-specific `HlxError` via thiserror
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{HlxError, Result};
// Re-export types at crate root for convenience.
pub use types::*;
