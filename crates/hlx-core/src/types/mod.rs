//! Wire-level types shared by the engine and its callers.

pub mod feeds;
pub mod message;
pub mod subscription;

pub use feeds::*;
pub use message::*;
pub use subscription::*;
