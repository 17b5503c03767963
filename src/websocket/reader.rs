//! Reader task owning the read half of the connection
//!
//! Answers every `/meta/connect` reply with the next connect, which keeps the
//! session alive, and forwards all other messages to the inbound queue.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::{Outbox, WsSource};
use super::protocol::{self, BayeuxMessage, Channel};
use super::TransportState;
use crate::error::{Result, StreamerError};

/// Item of the inbound queue
pub type Inbound = Result<BayeuxMessage>;

enum Flow {
    Continue,
    Stop,
}

pub(crate) async fn run_reader(
    mut source: WsSource,
    outbox: Arc<Outbox>,
    client_id: String,
    state: Arc<watch::Sender<TransportState>>,
    tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
    backlog: Vec<BayeuxMessage>,
) {
    let mut reader = Reader {
        outbox,
        client_id,
        tx,
        cancel,
        forwarding: true,
    };

    // messages that shared a batch with the handshake replies
    let mut flow = reader.dispatch_all(backlog).await;

    while let Flow::Continue = flow {
        let next = tokio::select! {
            biased;
            _ = reader.cancel.cancelled() => {
                debug!("Reader cancelled");
                break;
            }
            next = source.next() => next,
        };

        flow = match next {
            Some(Ok(Message::Text(text))) => reader.handle_text(&text).await,
            Some(Ok(Message::Binary(data))) => {
                reader.handle_text(&String::from_utf8_lossy(&data)).await
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Flow::Continue,
            Some(Ok(Message::Frame(_))) => Flow::Continue,
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                reader.outbox.mark_closed();
                reader.fail("connection closed by server".to_string()).await;
                Flow::Stop
            }
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                reader.outbox.mark_closed();
                reader.fail(e.to_string()).await;
                Flow::Stop
            }
            None => {
                warn!("WebSocket stream ended");
                reader.outbox.mark_closed();
                reader.fail("stream ended".to_string()).await;
                Flow::Stop
            }
        };
    }

    state.send_replace(TransportState::Disconnected);
    info!(client_id = %reader.client_id, "Reader stopped");
}

struct Reader {
    outbox: Arc<Outbox>,
    client_id: String,
    tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
    /// Cleared once the consumer has gone; control traffic is still served
    forwarding: bool,
}

impl Reader {
    async fn handle_text(&mut self, text: &str) -> Flow {
        let messages = match protocol::decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Dropping unreadable message");
                return Flow::Continue;
            }
        };

        self.dispatch_all(messages).await
    }

    async fn dispatch_all(&mut self, messages: Vec<BayeuxMessage>) -> Flow {
        for message in messages {
            let flow = match message.channel {
                Channel::Connect => self.handle_connect(&message).await,
                _ => self.forward(message).await,
            };
            if let Flow::Stop = flow {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    async fn handle_connect(&mut self, reply: &BayeuxMessage) -> Flow {
        if !reply.is_successful() && reply.advises_rehandshake() {
            self.fail(format!(
                "server ended the session: {}",
                reply.error.as_deref().unwrap_or("no reason given")
            ))
            .await;
            return Flow::Stop;
        }

        match self.outbox.send(BayeuxMessage::connect(&self.client_id)).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                self.fail(format!("failed to send connect: {e}")).await;
                Flow::Stop
            }
        }
    }

    async fn forward(&mut self, message: BayeuxMessage) -> Flow {
        if !self.forwarding {
            return Flow::Continue;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Flow::Stop,
            sent = self.tx.send(Ok(message)) => {
                if sent.is_err() {
                    debug!("Event consumer gone, no longer forwarding");
                    self.forwarding = false;
                }
                Flow::Continue
            }
        }
    }

    /// Report the end of the session unless the consumer or the owner has gone
    async fn fail(&mut self, reason: String) {
        if !self.forwarding {
            return;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(reason = %reason, "Cancelled before the disconnect was delivered");
            }
            _ = self.tx.send(Err(StreamerError::Disconnected(reason.clone()))) => {}
        }
    }
}
