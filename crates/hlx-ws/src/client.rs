//! Connection lifecycle and the public subscribe / post surface.
//!
//! # Locking
//!
//! Two independent locks:
//!
//! - the *lifecycle* mutex holds the live [`Connection`] (write half, stop
//!   signal, reader handle). `connect`, `disconnect`, `is_connected` and every
//!   outbound send take it, so a send never races a teardown;
//! - the *data* readers-writer lock guards the subscription registry and the
//!   request correlation table ([`Routes`]).
//!
//! Neither lock is held while a feed handler runs.
//!
//! `subscribe` and `post` connect on demand; `unsubscribe` does not and fails
//! with [`HlxError::NotConnected`] instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hlx_core::config::{Network, WsConfig};
use hlx_core::error::{HlxError, Result};
use hlx_core::types::{PostMessage, Subscription, SubscriptionMessage};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::reader::{self, Exit};
use crate::registry::Callback;
use crate::router::Routes;
use crate::transport::{self, WsWriter};

/// Request type for read-only queries.
pub const POST_INFO: &str = "info";
/// Request type for signed exchange actions.
pub const POST_ACTION: &str = "action";

/// One live connection, owned by the lifecycle mutex.
struct Connection {
    writer: WsWriter,
    stop_tx: watch::Sender<bool>,
    reader: JoinHandle<()>,
    epoch: u64,
}

/// State shared between the client handles and the reader task.
pub(crate) struct Shared {
    config: WsConfig,
    lifecycle: Mutex<Option<Connection>>,
    pub(crate) routes: RwLock<Routes>,
    next_request_id: AtomicU64,
    next_epoch: AtomicU64,
}

impl Shared {
    /// Called by the reader task on its way out.
    ///
    /// Only clears the connection the reader belongs to; a newer connection
    /// opened in the meantime is left alone.
    pub(crate) async fn reader_exited(&self, epoch: u64, exit: Exit) {
        let mut lifecycle = self.lifecycle.lock().await;
        let current = lifecycle.as_ref().is_some_and(|conn| conn.epoch == epoch);
        if !current {
            return;
        }
        *lifecycle = None;
        drop(lifecycle);

        if let Exit::Lost(reason) = exit {
            let failed = self
                .routes
                .write()
                .await
                .pending
                .fail_all(|| HlxError::Connection(format!("connection lost: {reason}")));
            warn!("[hl-ws] connection lost ({reason}), {failed} pending request(s) failed");
        }
    }
}

/// Client for the venue's streaming interface.
///
/// Cloning is cheap; every clone drives the same connection, registry and
/// correlation table.
#[derive(Clone)]
pub struct WsClient {
    shared: Arc<Shared>,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                lifecycle: Mutex::new(None),
                routes: RwLock::new(Routes::default()),
                next_request_id: AtomicU64::new(0),
                next_epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn mainnet() -> Self {
        Self::new(WsConfig::for_network(Network::Mainnet))
    }

    pub fn testnet() -> Self {
        Self::new(WsConfig::for_network(Network::Testnet))
    }

    pub fn config(&self) -> &WsConfig {
        &self.shared.config
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open the connection and start the reader. No-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        let mut lifecycle = self.shared.lifecycle.lock().await;
        if lifecycle.is_some() {
            return Ok(());
        }

        self.shared.config.validate()?;
        let url = self.shared.config.endpoint();
        info!("[hl-ws] connecting to {url}");
        let (writer, reader) = transport::open(url).await?;

        let epoch = self.shared.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(reader::run(
            Arc::clone(&self.shared),
            reader,
            stop_rx,
            epoch,
        ));

        *lifecycle = Some(Connection {
            writer,
            stop_tx,
            reader: task,
            epoch,
        });
        info!("[hl-ws] connected");
        Ok(())
    }

    /// Tear the connection down. No-op when already disconnected.
    ///
    /// Stops the reader, drops every subscription handler, fails every
    /// pending `post` with [`HlxError::Cancelled`], sends a close frame (best
    /// effort), waits the configured grace period and closes the socket.
    /// Transport errors during teardown are logged, not returned.
    pub async fn disconnect(&self) -> Result<()> {
        let mut lifecycle = self.shared.lifecycle.lock().await;
        let Some(mut conn) = lifecycle.take() else {
            return Ok(());
        };
        info!("[hl-ws] disconnecting");

        let _ = conn.stop_tx.send(true);

        {
            let mut routes = self.shared.routes.write().await;
            let handlers = routes.registry.len();
            routes.registry.clear();
            let cancelled = routes.pending.fail_all(|| HlxError::Cancelled);
            debug!("[hl-ws] cleared {handlers} handler(s), cancelled {cancelled} request(s)");
        }

        if let Err(e) = conn.writer.send_close_frame().await {
            warn!("[hl-ws] {e}");
        }
        tokio::time::sleep(self.shared.config.close_grace()).await;
        if let Err(e) = conn.writer.close().await {
            warn!("[hl-ws] {e}");
        }
        drop(lifecycle);

        // The reader exits on the stop signal; its own cleanup is a no-op
        // because the connection slot is already empty.
        if let Err(e) = conn.reader.await {
            warn!("[hl-ws] reader task ended abnormally: {e}");
        }

        info!("[hl-ws] disconnected");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.lifecycle.lock().await.is_some()
    }

    /// Send one text frame on the live connection.
    async fn send(&self, text: String) -> Result<()> {
        let mut lifecycle = self.shared.lifecycle.lock().await;
        match lifecycle.as_mut() {
            Some(conn) => conn.writer.send(text).await,
            None => Err(HlxError::NotConnected),
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected().await {
            self.connect().await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register `callback` for `subscription` and ask the venue for the feed.
    ///
    /// Connects first if needed. Re-subscribing to a descriptor with the same
    /// channel key replaces the previous handler. The handler is in place
    /// before the request is sent, so no early message is lost.
    ///
    /// `callback` runs on the reader task and must not block.
    pub async fn subscribe(&self, subscription: Subscription, callback: Callback) -> Result<()> {
        self.ensure_connected().await?;

        let key = subscription.channel_key();
        let replaced = self
            .shared
            .routes
            .write()
            .await
            .registry
            .insert(key.clone(), callback);
        debug!("[hl-ws] handler for {key} registered (replaced: {replaced})");

        let msg = serde_json::to_string(&SubscriptionMessage::subscribe(&subscription))?;
        self.send(msg).await
    }

    /// Drop the handler for `subscription` and ask the venue to stop the feed.
    ///
    /// Fails with [`HlxError::NotConnected`] rather than connecting. Removing
    /// a subscription that was never registered is not an error.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        if !self.is_connected().await {
            return Err(HlxError::NotConnected);
        }

        let key = subscription.channel_key();
        if !self.shared.routes.write().await.registry.remove(&key) {
            debug!("[hl-ws] unsubscribe: no handler for {key}");
        }

        let msg = serde_json::to_string(&SubscriptionMessage::unsubscribe(subscription))?;
        self.send(msg).await
    }

    /// Number of registered subscription handlers.
    pub async fn subscription_count(&self) -> usize {
        self.shared.routes.read().await.registry.len()
    }

    // -----------------------------------------------------------------------
    // Post requests
    // -----------------------------------------------------------------------

    /// Send a correlated request and wait for its response.
    ///
    /// Connects first if needed. Fails with [`HlxError::RequestTimeout`] when
    /// no response arrives within the configured timeout,
    /// [`HlxError::Remote`] when the venue answers with an error, and
    /// [`HlxError::Cancelled`] when the client disconnects meanwhile.
    pub async fn post<P: Serialize>(&self, request_type: &str, payload: &P) -> Result<Value> {
        self.ensure_connected().await?;

        let id = self.shared.next_request_id.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = serde_json::to_string(&PostMessage::new(id, request_type, payload))?;

        let rx = self.shared.routes.write().await.pending.register(id);

        if let Err(e) = self.send(msg).await {
            self.shared.routes.write().await.pending.remove(id);
            return Err(e);
        }

        let timeout = self.shared.config.request_timeout();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            // Slot dropped without an answer.
            Ok(Err(_)) => Err(HlxError::Cancelled),
            Err(_) => {
                self.shared.routes.write().await.pending.remove(id);
                warn!("[hl-ws] post {id} ({request_type}) timed out after {timeout:?}");
                Err(HlxError::RequestTimeout { id, timeout })
            }
        }
    }

    /// `post` with request type `"info"`.
    pub async fn post_info<P: Serialize>(&self, payload: &P) -> Result<Value> {
        self.post(POST_INFO, payload).await
    }

    /// `post` with request type `"action"`; `payload` is a signed action
    /// built elsewhere.
    pub async fn post_action<P: Serialize>(&self, payload: &P) -> Result<Value> {
        self.post(POST_ACTION, payload).await
    }

    /// Number of post requests awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.shared.routes.read().await.pending.len()
    }

    /// Configured post timeout.
    pub fn request_timeout(&self) -> Duration {
        self.shared.config.request_timeout()
    }
}
