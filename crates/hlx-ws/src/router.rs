//! Inbound message routing.
//!
//! Every text frame goes through [`dispatch`]:
//!
//! 1. `post` frames resolve the pending request with the same id.
//! 2. `subscriptionResponse` frames are acknowledgements and only logged.
//! 3. Everything else is a feed event, handed to the first handler found by
//!    trying, in order:
//!    - the inbound key: `channel[-coin][-user]` from the payload;
//!    - the subscription key: `channel[-user][-coin][-interval]`, read from
//!      the payload (or its first element when it is an array);
//!    - for `orderUpdates` only, the earliest `orderUpdates-*` registration;
//!    - the bare channel label.
//!
//! Handlers are cloned out of the registry and called after the lock is
//! released, so they may subscribe, unsubscribe or post themselves.

use hlx_core::types::channel;
use hlx_core::types::{Envelope, PostResponse, compose_key};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::pending::PendingRequests;
use crate::registry::{Callback, Registry};

/// Registry and correlation table, guarded together by one readers-writer
/// lock.
#[derive(Default)]
pub struct Routes {
    pub registry: Registry,
    pub pending: PendingRequests,
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A pending post request was resolved.
    Resolved(u64),
    /// A post response arrived for an id nobody waits for.
    Unmatched(u64),
    /// Subscription acknowledgement.
    Acknowledged,
    /// A feed handler ran; carries the registry key it was found under.
    Delivered(String),
    /// Feed event with no handler.
    Dropped,
    /// The frame could not be parsed.
    Malformed,
}

/// Parse `text` and route it.
pub async fn dispatch(routes: &RwLock<Routes>, text: &str) -> Dispatch {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("[hl-ws] dropping frame: {e}");
            return Dispatch::Malformed;
        }
    };

    match envelope.channel.as_str() {
        channel::POST => resolve_post(routes, envelope.data).await,
        channel::SUBSCRIPTION_RESPONSE => {
            debug!("[hl-ws] subscription acknowledged: {}", envelope.data);
            Dispatch::Acknowledged
        }
        _ => deliver_feed(routes, envelope).await,
    }
}

async fn resolve_post(routes: &RwLock<Routes>, data: Value) -> Dispatch {
    let response = match PostResponse::from_data(data) {
        Ok(response) => response,
        Err(e) => {
            warn!("[hl-ws] dropping frame: {e}");
            return Dispatch::Malformed;
        }
    };

    let id = response.id;
    let result = response.response.into_result();
    if routes.write().await.pending.resolve(id, result) {
        Dispatch::Resolved(id)
    } else {
        debug!("[hl-ws] no pending request {id}, response dropped");
        Dispatch::Unmatched(id)
    }
}

async fn deliver_feed(routes: &RwLock<Routes>, envelope: Envelope) -> Dispatch {
    let found = {
        let routes = routes.read().await;
        find_handler(&routes.registry, &envelope.channel, &envelope.data)
    };

    match found {
        Some((key, handler)) => {
            handler(envelope.data);
            Dispatch::Delivered(key)
        }
        None => {
            debug!("[hl-ws] no handler for channel {}", envelope.channel);
            Dispatch::Dropped
        }
    }
}

fn find_handler(registry: &Registry, label: &str, data: &Value) -> Option<(String, Callback)> {
    let inbound = inbound_key(label, data);
    if let Some(handler) = registry.get(&inbound) {
        return Some((inbound, handler));
    }

    let subscription = subscription_key(label, data);
    if subscription != inbound {
        if let Some(handler) = registry.get(&subscription) {
            return Some((subscription, handler));
        }
    }

    if let Some(found) = order_updates_fallback(registry, label) {
        return Some(found);
    }

    registry.get(label).map(|handler| (label.to_string(), handler))
}

/// `label[-coin][-user]` from top-level payload fields.
fn inbound_key(label: &str, data: &Value) -> String {
    compose_key(label, &[str_field(data, "coin"), str_field(data, "user")])
}

/// The key a subscription for this payload would have been registered under.
fn subscription_key(label: &str, data: &Value) -> String {
    let body = match data {
        Value::Array(items) => items.first().unwrap_or(data),
        _ => data,
    };
    let (coin, interval) = if label == channel::CANDLE {
        (str_field(body, "s"), str_field(body, "i"))
    } else {
        (str_field(body, "coin"), None)
    };
    compose_key(label, &[str_field(body, "user"), coin, interval])
}

/// Order updates arrive without the user the subscription was keyed on;
/// route them to the earliest user-scoped order-update subscription.
fn order_updates_fallback(registry: &Registry, label: &str) -> Option<(String, Callback)> {
    if label != channel::ORDER_UPDATES {
        return None;
    }
    registry.first_with_prefix(&format!("{}-", channel::ORDER_UPDATES))
}

fn str_field<'a>(data: &'a Value, name: &str) -> Option<&'a str> {
    data.get(name).and_then(Value::as_str)
}
