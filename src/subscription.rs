//! Subscription registry
//!
//! Tracks the symbols subscribed per event type and turns every change into a
//! command on `/service/sub`. The registry never talks to the socket directly;
//! it goes through the [`ControlChannel`] seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

use crate::error::{Result, StreamerError};
use crate::events::EventType;
use crate::websocket::TransportState;

/// Outgoing side of a connected session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlChannel: Send {
    fn state(&self) -> TransportState;

    /// Publish `command` on the subscription channel
    async fn send_command(&mut self, command: SubscriptionCommand) -> Result<()>;
}

/// One time-series (candle) subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesSubscription {
    pub event_symbol: String,
    /// Epoch milliseconds of the first requested candle
    pub from_time: i64,
}

/// Payload of a `/service/sub` message
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionCommand {
    Add {
        event_type: EventType,
        symbols: Vec<String>,
    },
    Remove {
        event_type: EventType,
        symbols: Vec<String>,
    },
    AddTimeSeries {
        event_type: EventType,
        subscriptions: Vec<TimeSeriesSubscription>,
    },
    RemoveTimeSeries {
        event_type: EventType,
        subscriptions: Vec<TimeSeriesSubscription>,
    },
    Reset,
}

impl SubscriptionCommand {
    pub fn to_data(&self) -> Value {
        match self {
            SubscriptionCommand::Add { event_type, symbols } => {
                json!({ "add": keyed(*event_type, json!(symbols)) })
            }
            SubscriptionCommand::Remove { event_type, symbols } => {
                json!({ "remove": keyed(*event_type, json!(symbols)) })
            }
            SubscriptionCommand::AddTimeSeries {
                event_type,
                subscriptions,
            } => json!({ "addTimeSeries": keyed(*event_type, json!(subscriptions)) }),
            SubscriptionCommand::RemoveTimeSeries {
                event_type,
                subscriptions,
            } => json!({ "removeTimeSeries": keyed(*event_type, json!(subscriptions)) }),
            SubscriptionCommand::Reset => json!({ "reset": true }),
        }
    }
}

fn keyed(event_type: EventType, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(event_type.as_str().to_string(), value);
    Value::Object(map)
}

/// Candle symbol for a ticker and aggregation period, e.g. `SPY{=5m,tho=true}`
///
/// `tho=true` restricts candles to regular trading hours, so it is left out
/// when extended hours are requested.
pub fn candle_symbol(ticker: &str, interval: &str, extended_hours: bool) -> String {
    if extended_hours {
        format!("{ticker}{{={interval}}}")
    } else {
        format!("{ticker}{{={interval},tho=true}}")
    }
}

/// Set of active subscriptions for one session
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<EventType, HashSet<String>>,
    time_series: BTreeSet<String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `symbols` for `event_type`
    pub async fn add<C: ControlChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        event_type: EventType,
        symbols: &[String],
    ) -> Result<()> {
        ensure_connected(channel)?;
        channel
            .send_command(SubscriptionCommand::Add {
                event_type,
                symbols: symbols.to_vec(),
            })
            .await?;

        self.subscriptions
            .entry(event_type)
            .or_default()
            .extend(symbols.iter().cloned());
        info!(event_type = %event_type, symbols = ?symbols, "Subscribed");
        Ok(())
    }

    /// Unsubscribe `symbols` for `event_type`
    pub async fn remove<C: ControlChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        event_type: EventType,
        symbols: &[String],
    ) -> Result<()> {
        ensure_connected(channel)?;
        channel
            .send_command(SubscriptionCommand::Remove {
                event_type,
                symbols: symbols.to_vec(),
            })
            .await?;

        if let Some(tracked) = self.subscriptions.get_mut(&event_type) {
            for symbol in symbols {
                tracked.remove(symbol);
            }
            if tracked.is_empty() {
                self.subscriptions.remove(&event_type);
            }
        }
        info!(event_type = %event_type, symbols = ?symbols, "Unsubscribed");
        Ok(())
    }

    /// Unsubscribe every tracked symbol of `event_type`
    pub async fn remove_all<C: ControlChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        event_type: EventType,
    ) -> Result<()> {
        ensure_connected(channel)?;
        let mut symbols = self.symbols(event_type);
        if symbols.is_empty() {
            debug!(event_type = %event_type, "Nothing to unsubscribe");
            return Ok(());
        }
        symbols.sort();
        self.remove(channel, event_type, &symbols).await
    }

    /// Drop every subscription, server side and locally
    pub async fn reset<C: ControlChannel + ?Sized>(&mut self, channel: &mut C) -> Result<()> {
        ensure_connected(channel)?;
        channel.send_command(SubscriptionCommand::Reset).await?;
        self.subscriptions.clear();
        self.time_series.clear();
        info!("Subscriptions reset");
        Ok(())
    }

    /// Subscribe candles for `symbols`, starting at `from_time`
    pub async fn add_candle<C: ControlChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        symbols: &[String],
        interval: &str,
        from_time: DateTime<Utc>,
        extended_hours: bool,
    ) -> Result<()> {
        ensure_connected(channel)?;
        let subscriptions = time_series(symbols, interval, from_time, extended_hours);
        channel
            .send_command(SubscriptionCommand::AddTimeSeries {
                event_type: EventType::Candle,
                subscriptions: subscriptions.clone(),
            })
            .await?;

        self.time_series
            .extend(subscriptions.into_iter().map(|s| s.event_symbol));
        info!(symbols = ?symbols, interval, "Subscribed candles");
        Ok(())
    }

    pub async fn remove_candle<C: ControlChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        symbols: &[String],
        interval: &str,
        from_time: DateTime<Utc>,
        extended_hours: bool,
    ) -> Result<()> {
        ensure_connected(channel)?;
        let subscriptions = time_series(symbols, interval, from_time, extended_hours);
        channel
            .send_command(SubscriptionCommand::RemoveTimeSeries {
                event_type: EventType::Candle,
                subscriptions: subscriptions.clone(),
            })
            .await?;

        for subscription in &subscriptions {
            self.time_series.remove(&subscription.event_symbol);
        }
        info!(symbols = ?symbols, interval, "Unsubscribed candles");
        Ok(())
    }

    /// Symbols tracked for `event_type`, in no particular order
    pub fn symbols(&self, event_type: EventType) -> Vec<String> {
        self.subscriptions
            .get(&event_type)
            .map(|symbols| symbols.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, event_type: EventType, symbol: &str) -> bool {
        self.subscriptions
            .get(&event_type)
            .is_some_and(|symbols| symbols.contains(symbol))
    }

    pub fn event_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.subscriptions.keys().copied().collect();
        types.sort();
        types
    }

    /// Active candle symbols, sorted
    pub fn candle_symbols(&self) -> Vec<String> {
        self.time_series.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.time_series.is_empty()
    }
}

fn ensure_connected<C: ControlChannel + ?Sized>(channel: &C) -> Result<()> {
    let state = channel.state();
    if state.is_connected() {
        Ok(())
    } else {
        Err(StreamerError::NotConnected { state })
    }
}

fn time_series(
    symbols: &[String],
    interval: &str,
    from_time: DateTime<Utc>,
    extended_hours: bool,
) -> Vec<TimeSeriesSubscription> {
    symbols
        .iter()
        .map(|ticker| TimeSeriesSubscription {
            event_symbol: candle_symbol(ticker, interval, extended_hours),
            from_time: from_time.timestamp_millis(),
        })
        .collect()
}
