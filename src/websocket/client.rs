//! CometD transport over a single WebSocket
//!
//! Handles the handshake and connect sequence, then hands the read half to a
//! reader task and keeps the write half for control traffic.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{self, BayeuxMessage, Channel};
use super::reader::{run_reader, Inbound};
use super::TransportState;
use crate::auth::{AuthExtension, StreamerCredentials};
use crate::config::StreamerConfig;
use crate::error::{Result, StreamerError};
use crate::subscription::{ControlChannel, SubscriptionCommand};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// Write half shared by the transport and its reader task
pub(crate) struct Outbox {
    sink: Mutex<WsSink>,
    auth: AuthExtension,
    next_id: AtomicU64,
    /// Cleared once the socket can no longer carry a goodbye
    open: AtomicBool,
}

impl Outbox {
    fn new(sink: WsSink, auth: AuthExtension) -> Self {
        Self {
            sink: Mutex::new(sink),
            auth,
            next_id: AtomicU64::new(1),
            open: AtomicBool::new(true),
        }
    }

    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Assign a message id, apply the auth extension and send
    pub(crate) async fn send(&self, mut message: BayeuxMessage) -> Result<()> {
        message.id = Some(self.next_id.fetch_add(1, Ordering::Relaxed).to_string());
        self.auth.stamp(&mut message);
        let text = protocol::encode(std::slice::from_ref(&message))?;

        debug!(channel = %message.channel, id = ?message.id, "Sending message");
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| StreamerError::WebSocketMessage(e.to_string()))
    }

    async fn close(&self) {
        self.mark_closed();
        if let Err(e) = self.sink.lock().await.close().await {
            debug!(error = %e, "Error closing WebSocket sink");
        }
    }
}

/// An open streaming connection
pub struct Transport {
    outbox: Arc<Outbox>,
    client_id: String,
    state: Arc<watch::Sender<TransportState>>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl Transport {
    /// Connect, handshake and start the reader task
    ///
    /// Returns the transport together with the queue of inbound messages. A
    /// failed handshake is not retried.
    pub async fn open(
        config: &StreamerConfig,
        credentials: &StreamerCredentials,
    ) -> Result<(Self, mpsc::Receiver<Inbound>)> {
        let state = Arc::new(watch::channel(TransportState::Disconnected).0);

        info!(url = %credentials.url, "Connecting to streamer");
        let (ws_stream, response) = connect_async(credentials.url.as_str())
            .await
            .map_err(|e| StreamerError::HandshakeFailure(format!("Failed to connect: {e}")))?;
        info!(status = ?response.status(), "WebSocket connected");

        let (sink, mut source) = ws_stream.split();
        let outbox = Arc::new(Outbox::new(sink, AuthExtension::new(&credentials.token)));

        state.send_replace(TransportState::Handshaking);
        let (client_id, backlog) = match timeout(
            config.handshake_timeout,
            establish(&outbox, &mut source, &state),
        )
        .await
        {
            Ok(Ok(established)) => established,
            Ok(Err(e)) => {
                outbox.close().await;
                state.send_replace(TransportState::Disconnected);
                return Err(e);
            }
            Err(_) => {
                outbox.close().await;
                state.send_replace(TransportState::Disconnected);
                return Err(StreamerError::HandshakeFailure(format!(
                    "no reply within {:?}",
                    config.handshake_timeout
                )));
            }
        };

        let (tx, rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(run_reader(
            source,
            Arc::clone(&outbox),
            client_id.clone(),
            Arc::clone(&state),
            tx,
            cancel.clone(),
            backlog,
        ));

        info!(client_id = %client_id, "Streamer session established");

        Ok((
            Self {
                outbox,
                client_id,
                state,
                cancel,
                reader: Some(reader),
            },
            rx,
        ))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Token that stops the reader task; the event stream then ends
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watch state transitions, including the reader's final `Disconnected`
    pub fn subscribe_state(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    /// Publish a payload on a service channel
    pub async fn publish(&self, channel: Channel, data: serde_json::Value) -> Result<()> {
        self.outbox
            .send(BayeuxMessage::publish(channel, &self.client_id, data))
            .await
    }

    /// Say goodbye to the server and release the connection
    ///
    /// The goodbye is sent whenever the socket is still usable, including
    /// after the cancellation token has stopped the reader.
    pub async fn close(mut self) -> Result<()> {
        if self.outbox.is_open() {
            if let Err(e) = self
                .outbox
                .send(BayeuxMessage::disconnect(&self.client_id))
                .await
            {
                warn!(error = %e, "Failed to send disconnect");
            }
        }
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!(error = %e, "Reader task ended abnormally");
            }
        }
        self.outbox.close().await;
        self.state.send_replace(TransportState::Disconnected);
        info!(client_id = %self.client_id, "Transport closed");
        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // The reader owns the read half; stopping it releases the socket.
        self.cancel.cancel();
    }
}

#[async_trait]
impl ControlChannel for Transport {
    fn state(&self) -> TransportState {
        *self.state.borrow()
    }

    async fn send_command(&mut self, command: SubscriptionCommand) -> Result<()> {
        self.publish(Channel::Subscription, command.to_data()).await?;
        match command {
            SubscriptionCommand::Add { .. } | SubscriptionCommand::AddTimeSeries { .. } => {
                self.state.send_if_modified(|state| {
                    let changed = *state == TransportState::Connected;
                    if changed {
                        *state = TransportState::Subscribed;
                    }
                    changed
                });
            }
            SubscriptionCommand::Reset => {
                self.state.send_if_modified(|state| {
                    let changed = *state == TransportState::Subscribed;
                    if changed {
                        *state = TransportState::Connected;
                    }
                    changed
                });
            }
            _ => {}
        }
        Ok(())
    }
}

/// Handshake then connect, returning the assigned client id and any messages
/// that arrived alongside the replies
async fn establish(
    outbox: &Outbox,
    source: &mut WsSource,
    state: &watch::Sender<TransportState>,
) -> Result<(String, Vec<BayeuxMessage>)> {
    let mut backlog = Vec::new();
    outbox.send(BayeuxMessage::handshake()).await?;
    let reply = await_reply(source, &Channel::Handshake, &mut backlog).await?;
    if !reply.is_successful() {
        return Err(StreamerError::HandshakeFailure(
            reply
                .error
                .unwrap_or_else(|| "handshake rejected".to_string()),
        ));
    }
    let client_id = reply.client_id.ok_or_else(|| {
        StreamerError::HandshakeFailure("handshake reply without clientId".to_string())
    })?;
    debug!(client_id = %client_id, "Handshake accepted");

    outbox.send(BayeuxMessage::connect(&client_id)).await?;
    let reply = await_reply(source, &Channel::Connect, &mut backlog).await?;
    if !reply.is_successful() {
        return Err(StreamerError::HandshakeFailure(
            reply.error.unwrap_or_else(|| "connect rejected".to_string()),
        ));
    }

    state.send_replace(TransportState::Connected);
    Ok((client_id, backlog))
}

/// Read until a message arrives on `channel`
///
/// Everything else read on the way, including the rest of the reply's batch,
/// is kept in `backlog` for the reader.
async fn await_reply(
    source: &mut WsSource,
    channel: &Channel,
    backlog: &mut Vec<BayeuxMessage>,
) -> Result<BayeuxMessage> {
    loop {
        let text = match source.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).to_string(),
            Some(Ok(Message::Close(frame))) => {
                return Err(StreamerError::HandshakeFailure(format!(
                    "connection closed during handshake: {frame:?}"
                )))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(StreamerError::HandshakeFailure(e.to_string())),
            None => {
                return Err(StreamerError::HandshakeFailure(
                    "connection ended during handshake".to_string(),
                ))
            }
        };

        let messages = protocol::decode(&text)
            .map_err(|e| StreamerError::HandshakeFailure(format!("unreadable reply: {e}")))?;
        let mut reply = None;
        for message in messages {
            if reply.is_none() && &message.channel == channel {
                reply = Some(message);
            } else {
                debug!(channel = %message.channel, "Deferring message until the session is up");
                backlog.push(message);
            }
        }
        if let Some(reply) = reply {
            return Ok(reply);
        }
    }
}
