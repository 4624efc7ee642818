//! Control messages sent to the venue and the envelopes it sends back.
//!
//! Outbound:
//!
//! ```json
//! {"method": "subscribe", "subscription": {"type": "l2Book", "coin": "BTC"}}
//! {"method": "post", "id": 3, "request": {"type": "info", "payload": {...}}}
//! ```
//!
//! Inbound, every frame is `{"channel": ..., "data": ...}`; post responses
//! nest `{"id": ..., "response": {"type": ..., "payload": ...}}` in `data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::subscription::Subscription;
use crate::error::{HlxError, Result};

/// Response type tag marking a failed post request.
pub const ERROR_RESPONSE: &str = "error";

/// Message used when the venue reports an error without any text.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// `subscribe` / `unsubscribe` request.
#[derive(Debug, Serialize)]
pub struct SubscriptionMessage<'a> {
    pub method: &'static str,
    pub subscription: &'a Subscription,
}

impl<'a> SubscriptionMessage<'a> {
    pub fn subscribe(subscription: &'a Subscription) -> Self {
        Self {
            method: "subscribe",
            subscription,
        }
    }

    pub fn unsubscribe(subscription: &'a Subscription) -> Self {
        Self {
            method: "unsubscribe",
            subscription,
        }
    }
}

/// Correlated request carried over the stream.
#[derive(Debug, Serialize)]
pub struct PostMessage<'a, P: Serialize> {
    pub method: &'static str,
    pub id: u64,
    pub request: PostRequest<'a, P>,
}

#[derive(Debug, Serialize)]
pub struct PostRequest<'a, P: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub payload: &'a P,
}

impl<'a, P: Serialize> PostMessage<'a, P> {
    pub fn new(id: u64, kind: &'a str, payload: &'a P) -> Self {
        Self {
            method: "post",
            id,
            request: PostRequest { kind, payload },
        }
    }
}

/// Outer form of every inbound frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| HlxError::Malformed(format!("envelope: {e}")))
    }
}

/// `data` of a frame on the `post` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct PostResponse {
    pub id: u64,
    pub response: PostResponseBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostResponseBody {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl PostResponse {
    pub fn from_data(data: Value) -> Result<Self> {
        serde_json::from_value(data).map_err(|e| HlxError::Malformed(format!("post response: {e}")))
    }
}

impl PostResponseBody {
    pub fn is_error(&self) -> bool {
        self.kind == ERROR_RESPONSE
    }

    /// Server-supplied error text, or [`UNKNOWN_ERROR`] when it sent none.
    pub fn error_message(&self) -> String {
        match self.payload.as_str() {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => UNKNOWN_ERROR.to_string(),
        }
    }

    /// Turn the body into the value handed back to the `post` caller.
    pub fn into_result(self) -> Result<Value> {
        if self.is_error() {
            Err(HlxError::Remote(self.error_message()))
        } else {
            Ok(self.payload)
        }
    }
}
