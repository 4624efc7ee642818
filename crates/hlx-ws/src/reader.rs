//! Background reader task: one per live connection.
//!
//! Pulls frames off the read half and dispatches them until the stop signal
//! fires or the transport fails. There is no retry: a read failure or remote
//! close ends the task and leaves the client disconnected.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::client::Shared;
use crate::router::{self, Dispatch};
use crate::transport::{self, Inbound, WsReader};

/// Why the reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Exit {
    Stopped,
    Lost(String),
}

pub(crate) async fn run(
    shared: Arc<Shared>,
    mut reader: WsReader,
    mut stop_rx: watch::Receiver<bool>,
    epoch: u64,
) {
    debug!("[hl-ws] reader {epoch} started");

    let exit = loop {
        if *stop_rx.borrow() {
            break Exit::Stopped;
        }

        let inbound = tokio::select! {
            biased;
            // A dropped sender counts as a stop request too.
            _ = stop_rx.changed() => break Exit::Stopped,
            inbound = transport::receive_one(&mut reader) => inbound,
        };

        match inbound {
            Ok(Some(Inbound::Text(text))) => {
                let outcome = router::dispatch(&shared.routes, &text).await;
                if outcome == Dispatch::Malformed {
                    debug!("[hl-ws] malformed frame: {}", truncate_for_log(&text, 512));
                } else {
                    trace!("[hl-ws] {outcome:?}");
                }
            }
            Ok(Some(Inbound::Control)) => {}
            Ok(Some(Inbound::Closed(reason))) => {
                warn!("[hl-ws] remote closed the connection: {reason:?}");
                break Exit::Lost("closed by remote".into());
            }
            Ok(None) => {
                warn!("[hl-ws] stream ended");
                break Exit::Lost("stream ended".into());
            }
            Err(e) => {
                error!("[hl-ws] {e}");
                break Exit::Lost(e.to_string());
            }
        }
    };

    info!("[hl-ws] reader {epoch} exiting: {exit:?}");
    shared.reader_exited(epoch, exit).await;
}

fn truncate_for_log(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
