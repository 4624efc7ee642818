//! Duplex connection wrapper over `tokio-tungstenite`.
//!
//! [`open`] performs the TLS/WebSocket handshake and splits the stream: the
//! write half ([`WsWriter`]) is owned by the lifecycle manager, the read half
//! ([`WsReader`]) is moved into the reader task. Ping frames are answered by
//! tungstenite itself; the pong is flushed on the next read or write.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hlx_core::error::{HlxError, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as TungsteniteError, Message};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of the connection.
pub type WsReader = SplitStream<WsStream>;

/// One inbound unit as seen by the reader loop.
#[derive(Debug)]
pub enum Inbound {
    /// A text (or UTF-8 binary) frame.
    Text(String),
    /// Control frame with nothing to dispatch.
    Control,
    /// The peer sent a close frame.
    Closed(Option<String>),
}

/// Block until the next frame arrives.
///
/// `Ok(None)` means the stream ended without a close frame.
pub async fn receive_one(reader: &mut WsReader) -> Result<Option<Inbound>> {
    let Some(frame) = reader.next().await else {
        return Ok(None);
    };
    let frame = frame.map_err(|e| HlxError::Connection(format!("read: {e}")))?;
    let inbound = match frame {
        Message::Text(text) => Inbound::Text(text.to_string()),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Inbound::Text(text),
            Err(e) => {
                debug!("[hl-ws] non-utf8 binary frame ({} bytes): {e}", e.as_bytes().len());
                Inbound::Control
            }
        },
        Message::Close(frame) => Inbound::Closed(frame.map(|f| format!("{} {}", f.code, f.reason))),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
    };
    Ok(Some(inbound))
}

/// Write half of the connection.
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl WsWriter {
    /// Send one text frame.
    pub async fn send(&mut self, text: String) -> Result<()> {
        debug!("[hl-ws] >> {text}");
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| HlxError::Connection(format!("send: {e}")))
    }

    /// Send a protocol-level close frame with a normal-closure code.
    pub async fn send_close_frame(&mut self) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| HlxError::Connection(format!("close frame: {e}")))
    }

    /// Flush and close the underlying socket.
    pub async fn close(mut self) -> Result<()> {
        match self.sink.close().await {
            Ok(()) => Ok(()),
            // The close handshake already completed from our side.
            Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed) => Ok(()),
            Err(e) => Err(HlxError::Connection(format!("close: {e}"))),
        }
    }
}

/// Open a WebSocket connection to `url` and split it into its two halves.
pub async fn open(url: &str) -> Result<(WsWriter, WsReader)> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| HlxError::Connection(format!("connect {url}: {e}")))?;
    let (sink, reader) = stream.split();
    Ok((WsWriter { sink }, reader))
}
