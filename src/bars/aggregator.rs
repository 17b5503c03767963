//! Per-symbol bar state machine

use rust_decimal::Decimal;
use tracing::debug;

use super::{OhlcvBar, Timeframe};
use crate::error::{Result, StreamerError};
use crate::events::Trade;

/// Bars for one (symbol, timeframe) pair
#[derive(Debug, Clone)]
pub struct OhlcvBars {
    symbol: String,
    timeframe: Timeframe,
    current: Option<OhlcvBar>,
    bars: Vec<OhlcvBar>,
}

impl OhlcvBars {
    /// Fails on an unrecognized timeframe, before any tick is seen
    pub fn new(symbol: impl Into<String>, timeframe: &str) -> Result<Self> {
        Ok(Self::with_timeframe(symbol, Timeframe::parse(timeframe)?))
    }

    pub fn with_timeframe(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            current: None,
            bars: Vec::new(),
        }
    }

    /// Fold one tick, returning the bar it finalized, if any
    pub fn update(&mut self, trade: &Trade) -> Result<Option<OhlcvBar>> {
        let price = trade.price.ok_or_else(|| StreamerError::MissingPrice {
            symbol: trade.event_symbol.clone(),
        })?;

        let finalized = match self.timeframe {
            Timeframe::Ticks(limit) => self.update_ticks(price, trade, limit),
            Timeframe::Duration { .. } => {
                let bucket = self.timeframe.bucket_start(trade.time).ok_or_else(|| {
                    StreamerError::ParseError(format!(
                        "trade time {} has no {} bucket",
                        trade.time, self.timeframe
                    ))
                })?;
                self.update_bucket(price, trade, bucket)
            }
        };

        if let Some(bar) = &finalized {
            debug!(
                symbol = %self.symbol,
                timeframe = %self.timeframe,
                timestamp = bar.timestamp,
                ticks = bar.tick_count,
                "Bar finalized"
            );
            self.bars.push(bar.clone());
        }
        Ok(finalized)
    }

    fn update_ticks(&mut self, price: Decimal, trade: &Trade, limit: u64) -> Option<OhlcvBar> {
        if let Some(bar) = self.current.as_mut() {
            extend(bar, price, trade.size);
        } else {
            let fresh = self.seed(price, trade.size, trade.time);
            self.current = Some(fresh);
        }

        if self.current.as_ref().is_some_and(|bar| bar.tick_count >= limit) {
            self.current.take()
        } else {
            None
        }
    }

    fn update_bucket(&mut self, price: Decimal, trade: &Trade, bucket: i64) -> Option<OhlcvBar> {
        if let Some(bar) = self.current.as_mut().filter(|bar| bar.timestamp == bucket) {
            extend(bar, price, trade.size);
            return None;
        }
        // first tick, or the bucket rolled over
        let fresh = self.seed(price, trade.size, bucket);
        self.current.replace(fresh)
    }

    fn seed(&self, price: Decimal, size: Option<i64>, timestamp: i64) -> OhlcvBar {
        OhlcvBar {
            symbol: self.symbol.clone(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: size,
            tick_count: 1,
            timestamp,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// In-progress bar
    pub fn current(&self) -> Option<&OhlcvBar> {
        self.current.as_ref()
    }

    /// Finalized bars, oldest first
    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }
}

fn extend(bar: &mut OhlcvBar, price: Decimal, size: Option<i64>) {
    bar.high = bar.high.max(price);
    bar.low = bar.low.min(price);
    bar.close = price;
    if size.is_some() {
        bar.volume = size;
    }
    bar.tick_count += 1;
}
