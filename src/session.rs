//! Streaming session
//!
//! A [`Streamer`] owns one transport, its subscription registry and the event
//! stream fed by the transport's reader task.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::TokenProvider;
use crate::config::StreamerConfig;
use crate::dispatcher::{self, EventStream};
use crate::error::Result;
use crate::events::{EventType, MarketEvent};
use crate::metrics::StreamMetrics;
use crate::subscription::{ControlChannel, SubscriptionRegistry};
use crate::websocket::{Transport, TransportState};

pub struct Streamer {
    transport: Transport,
    registry: SubscriptionRegistry,
    events: EventStream,
}

impl Streamer {
    /// Connect and start from an empty subscription set
    ///
    /// Subscriptions left over from an earlier session on the same token are
    /// dropped by the initial reset.
    pub async fn open(config: &StreamerConfig, tokens: &dyn TokenProvider) -> Result<Self> {
        let credentials = tokens.credentials().await?;
        let (transport, inbound) = Transport::open(config, &credentials).await?;

        let mut streamer = Self {
            transport,
            registry: SubscriptionRegistry::new(),
            events: EventStream::new(inbound),
        };
        streamer.reset().await?;
        info!(client_id = %streamer.transport.client_id(), "Streamer ready");
        Ok(streamer)
    }

    pub async fn subscribe(&mut self, event_type: EventType, symbols: &[String]) -> Result<()> {
        self.registry
            .add(&mut self.transport, event_type, symbols)
            .await
    }

    pub async fn unsubscribe(&mut self, event_type: EventType, symbols: &[String]) -> Result<()> {
        self.registry
            .remove(&mut self.transport, event_type, symbols)
            .await
    }

    pub async fn unsubscribe_all(&mut self, event_type: EventType) -> Result<()> {
        self.registry
            .remove_all(&mut self.transport, event_type)
            .await
    }

    /// Subscribe candles of `interval` (e.g. `5m`) starting at `from_time`
    pub async fn subscribe_candle(
        &mut self,
        symbols: &[String],
        interval: &str,
        from_time: DateTime<Utc>,
        extended_hours: bool,
    ) -> Result<()> {
        self.registry
            .add_candle(&mut self.transport, symbols, interval, from_time, extended_hours)
            .await
    }

    pub async fn unsubscribe_candle(
        &mut self,
        symbols: &[String],
        interval: &str,
        from_time: DateTime<Utc>,
        extended_hours: bool,
    ) -> Result<()> {
        self.registry
            .remove_candle(&mut self.transport, symbols, interval, from_time, extended_hours)
            .await
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.registry.reset(&mut self.transport).await
    }

    /// Live event sequence; runs until the transport goes away
    pub fn listen(&mut self) -> &mut EventStream {
        &mut self.events
    }

    /// Subscribe, collect at least `symbols.len()` events and unsubscribe
    pub async fn stream(
        &mut self,
        event_type: EventType,
        symbols: &[String],
    ) -> Result<Vec<MarketEvent>> {
        dispatcher::stream(
            &mut self.registry,
            &mut self.transport,
            &mut self.events,
            event_type,
            symbols,
        )
        .await
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    /// Cancelling ends `listen` with `None`
    pub fn cancellation_token(&self) -> CancellationToken {
        self.transport.cancellation_token()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn attach_metrics(&mut self, metrics: Arc<StreamMetrics>) {
        self.events.set_metrics(metrics);
    }

    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}
