//! Event dispatcher
//!
//! Turns the transport's inbound queue into a stream of decoded events.

use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, StreamerError};
use crate::events::{EventType, MarketEvent};
use crate::metrics::StreamMetrics;
use crate::parser::{self, ParsedMessage};
use crate::subscription::{ControlChannel, SubscriptionRegistry};
use crate::websocket::{BayeuxMessage, Inbound};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    /// Terminal; reached on channel end, decode error or disconnect
    Closed,
}

/// Live sequence of decoded events
///
/// Records of one frame are buffered and handed out one at a time, so a
/// consumer dropped between two `next_event` calls loses nothing already read
/// off the socket.
pub struct EventStream {
    inbound: mpsc::Receiver<Inbound>,
    pending: VecDeque<MarketEvent>,
    state: StreamState,
    metrics: Option<Arc<StreamMetrics>>,
}

impl EventStream {
    pub fn new(inbound: mpsc::Receiver<Inbound>) -> Self {
        Self {
            inbound,
            pending: VecDeque::new(),
            state: StreamState::Open,
            metrics: None,
        }
    }

    pub fn set_metrics(&mut self, metrics: Arc<StreamMetrics>) {
        self.metrics = Some(metrics);
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Wait for the next event; `None` once the stream has ended
    pub async fn next_event(&mut self) -> Option<Result<MarketEvent>> {
        self.next().await
    }

    fn close(&mut self) {
        self.inbound.close();
        self.state = StreamState::Closed;
    }

    /// Decode a data message into the pending buffer
    fn absorb(&mut self, message: BayeuxMessage) -> Result<()> {
        if !message.channel.is_data() {
            debug!(channel = %message.channel, "Discarding non-data message");
            return Ok(());
        }
        let Some(data) = message.data else {
            return Ok(());
        };

        match parser::parse_data_message(&data) {
            Ok(ParsedMessage::Events { event_type, frame }) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_frame(event_type, frame.events.len(), frame.skipped);
                }
                self.pending.extend(frame.events);
                Ok(())
            }
            Ok(ParsedMessage::Unknown(name)) => {
                warn!(event_type = %name, "Ignoring frame of unknown event type");
                if let Some(metrics) = &self.metrics {
                    metrics.record_unknown_event();
                }
                Ok(())
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_decode_error();
                }
                Err(e)
            }
        }
    }
}

impl Stream for EventStream {
    type Item = Result<MarketEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.state == StreamState::Closed {
                return Poll::Ready(None);
            }

            match ready!(this.inbound.poll_recv(cx)) {
                Some(Ok(message)) => {
                    if let Err(e) = this.absorb(message) {
                        warn!(error = %e, "Event stream terminated by decode error");
                        this.close();
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Event stream terminated by transport");
                    this.close();
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    debug!("Event stream ended");
                    this.close();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// Subscribe, collect at least `symbols.len()` events, then unsubscribe
///
/// The bound counts events of any type and symbol, so a chatty symbol can
/// fill the quota on its own.
pub async fn stream<C: ControlChannel + ?Sized>(
    registry: &mut SubscriptionRegistry,
    channel: &mut C,
    events: &mut EventStream,
    event_type: EventType,
    symbols: &[String],
) -> Result<Vec<MarketEvent>> {
    registry.add(channel, event_type, symbols).await?;

    let mut collected = Vec::with_capacity(symbols.len());
    while collected.len() < symbols.len() {
        match events.next_event().await {
            Some(event) => collected.push(event?),
            None => {
                return Err(StreamerError::Disconnected(
                    "event stream ended before enough events arrived".to_string(),
                ))
            }
        }
    }

    registry.remove(channel, event_type, symbols).await?;
    Ok(collected)
}
