//! In-process mock venue for integration tests.
//!
//! Listens on an ephemeral loopback port and serves one WebSocket session at
//! a time. Frames the client sends are parsed and queued for the test to
//! inspect; frames the test pushes are written to the client. Subscribe and
//! unsubscribe requests are acknowledged automatically, like the real venue.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hlx_core::config::WsConfig;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(3);

enum Push {
    Text(String),
    Close,
}

pub struct MockVenue {
    pub url: String,
    received: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<Push>,
    sessions: Arc<AtomicUsize>,
}

impl MockVenue {
    pub async fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("hlx_ws=debug")
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("ws://{}", listener.local_addr().expect("addr"));
        let (received_tx, received) = mpsc::unbounded_channel();
        let (push, mut push_rx) = mpsc::unbounded_channel::<Push>();
        let sessions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sessions);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                loop {
                    tokio::select! {
                        frame = ws.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                                    continue;
                                };
                                if let Some(ack) = acknowledgement(&value) {
                                    let _ = ws.send(Message::Text(ack.to_string().into())).await;
                                }
                                let _ = received_tx.send(value);
                            }
                            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                            Some(Ok(_)) => {}
                        },
                        pushed = push_rx.recv() => match pushed {
                            Some(Push::Text(text)) => {
                                if ws.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Some(Push::Close) => {
                                let _ = ws.close(None).await;
                                break;
                            }
                            None => return,
                        },
                    }
                }
            }
        });

        Self {
            url,
            received,
            push,
            sessions,
        }
    }

    /// Client settings pointing at this venue.
    pub fn config(&self) -> WsConfig {
        let mut config = WsConfig::with_url(self.url.clone());
        config.close_grace_ms = 20;
        config
    }

    /// Next frame the client sent.
    pub async fn next_sent(&mut self) -> Value {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("client sent nothing")
            .expect("venue stopped")
    }

    /// Next frame the client sent whose `method` is `method`.
    pub async fn next_with_method(&mut self, method: &str) -> Value {
        loop {
            let frame = self.next_sent().await;
            if frame["method"] == method {
                return frame;
            }
        }
    }

    pub fn push(&self, frame: Value) {
        self.push_raw(&frame.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.push.send(Push::Text(text.to_string()));
    }

    /// Feed event on `channel`.
    pub fn push_feed(&self, channel: &str, data: Value) {
        self.push(json!({"channel": channel, "data": data}));
    }

    /// Answer post request `id`.
    pub fn respond(&self, id: u64, kind: &str, payload: Value) {
        self.push(json!({
            "channel": "post",
            "data": {"id": id, "response": {"type": kind, "payload": payload}}
        }));
    }

    /// Close the current session from the venue side.
    pub fn hang_up(&self) {
        let _ = self.push.send(Push::Close);
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Wait until `n` sessions have been accepted.
    pub async fn wait_for_sessions(&self, n: usize) -> bool {
        let sessions = Arc::clone(&self.sessions);
        eventually(move || {
            let sessions = Arc::clone(&sessions);
            async move { sessions.load(Ordering::SeqCst) == n }
        })
        .await
    }
}

fn acknowledgement(frame: &Value) -> Option<Value> {
    match frame["method"].as_str() {
        Some("subscribe") | Some("unsubscribe") => Some(json!({
            "channel": "subscriptionResponse",
            "data": frame,
        })),
        _ => None,
    }
}

/// Receive from a test-side channel, failing the test after [`WAIT`].
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("nothing delivered in time")
        .expect("channel closed")
}

/// Poll `check` until it holds or [`WAIT`] elapses.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
