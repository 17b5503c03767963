//! Bar manager
//!
//! Routes trades to every aggregator registered for their symbol.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::{OhlcvBar, OhlcvBars, Timeframe};
use crate::error::Result;
use crate::events::MarketEvent;
use crate::metrics::StreamMetrics;

/// Aggregators keyed by symbol, one per registered timeframe
#[derive(Debug, Default)]
pub struct BarManager {
    aggregators: HashMap<String, Vec<OhlcvBars>>,
    metrics: Option<Arc<StreamMetrics>>,
}

impl BarManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Arc<StreamMetrics>) -> Self {
        Self {
            aggregators: HashMap::new(),
            metrics: Some(metrics),
        }
    }

    /// Track `symbol` at `timeframe`; registering a pair twice is a no-op
    pub fn register(&mut self, symbol: &str, timeframe: &str) -> Result<()> {
        let timeframe = Timeframe::parse(timeframe)?;
        let aggregators = self.aggregators.entry(symbol.to_string()).or_default();
        if !aggregators.iter().any(|bars| bars.timeframe() == timeframe) {
            aggregators.push(OhlcvBars::with_timeframe(symbol, timeframe));
        }
        Ok(())
    }

    /// Feed one event; returns the bars it finalized
    ///
    /// Non-trade events and untracked symbols are ignored. A trade without a
    /// price is an error and leaves every aggregator unchanged.
    pub fn apply(&mut self, event: &MarketEvent) -> Result<Vec<OhlcvBar>> {
        let MarketEvent::Trade(trade) = event else {
            return Ok(Vec::new());
        };
        let Some(aggregators) = self.aggregators.get_mut(&trade.event_symbol) else {
            return Ok(Vec::new());
        };

        let mut finalized = Vec::new();
        for bars in aggregators.iter_mut() {
            if let Some(bar) = bars.update(trade)? {
                if let Some(metrics) = &self.metrics {
                    metrics.record_bar(&bars.timeframe().to_string());
                }
                finalized.push(bar);
            }
        }
        Ok(finalized)
    }

    pub fn get(&self, symbol: &str, timeframe: &str) -> Option<&OhlcvBars> {
        let timeframe = match Timeframe::parse(timeframe) {
            Ok(timeframe) => timeframe,
            Err(e) => {
                warn!(error = %e, "Lookup with invalid timeframe");
                return None;
            }
        };
        self.aggregators
            .get(symbol)?
            .iter()
            .find(|bars| bars.timeframe() == timeframe)
    }

    /// Finalized bars for a pair, oldest first
    pub fn bars(&self, symbol: &str, timeframe: &str) -> &[OhlcvBar] {
        self.get(symbol, timeframe)
            .map(OhlcvBars::bars)
            .unwrap_or_default()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.aggregators.keys().cloned().collect()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.aggregators.contains_key(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamerError;
    use crate::events::Trade;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn trade(symbol: &str, time: i64, price: Option<Decimal>) -> MarketEvent {
        MarketEvent::Trade(Trade {
            event_symbol: symbol.to_string(),
            event_time: 0,
            time,
            time_nano_part: 0,
            sequence: 0,
            exchange_code: "Q".to_string(),
            day_id: 19700,
            tick_direction: "UP".to_string(),
            extended_trading_hours: false,
            price,
            change: None,
            size: Some(10),
            day_volume: None,
            day_turnover: None,
        })
    }

    #[test]
    fn test_routes_by_symbol_and_timeframe() {
        let mut manager = BarManager::new();
        manager.register("AAPL", "2t").unwrap();
        manager.register("AAPL", "1m").unwrap();
        manager.register("MSFT", "2t").unwrap();

        assert!(manager.apply(&trade("AAPL", 1_000, Some(dec!(1)))).unwrap().is_empty());
        let finalized = manager.apply(&trade("AAPL", 2_000, Some(dec!(2)))).unwrap();

        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].tick_count, 2);
        assert_eq!(manager.bars("AAPL", "2t").len(), 1);
        assert!(manager.bars("AAPL", "1m").is_empty());
        assert_eq!(manager.get("AAPL", "1m").unwrap().current().unwrap().tick_count, 2);
        assert!(manager.get("MSFT", "2t").unwrap().current().is_none());
    }

    #[test]
    fn test_ignores_untracked_symbols() {
        let mut manager = BarManager::new();
        manager.register("AAPL", "1t").unwrap();

        assert!(manager.apply(&trade("TSLA", 0, Some(dec!(1)))).unwrap().is_empty());
        assert!(!manager.has_symbol("TSLA"));
    }

    #[test]
    fn test_register_is_idempotent_and_validates() {
        let mut manager = BarManager::new();
        manager.register("AAPL", "5m").unwrap();
        manager.register("AAPL", "5m").unwrap();
        assert_eq!(manager.symbols(), vec!["AAPL".to_string()]);

        assert!(matches!(
            manager.register("AAPL", "7m"),
            Err(StreamerError::InvalidTimeframe(_))
        ));
        assert!(manager.get("AAPL", "7m").is_none());
    }

    #[test]
    fn test_missing_price_surfaces() {
        let mut manager = BarManager::new();
        manager.register("AAPL", "1t").unwrap();
        assert!(matches!(
            manager.apply(&trade("AAPL", 0, None)),
            Err(StreamerError::MissingPrice { .. })
        ));
    }

    #[test]
    fn test_counts_finalized_bars() {
        let metrics = Arc::new(StreamMetrics::new().unwrap());
        let mut manager = BarManager::with_metrics(Arc::clone(&metrics));
        manager.register("AAPL", "1t").unwrap();

        manager.apply(&trade("AAPL", 0, Some(dec!(1)))).unwrap();
        manager.apply(&trade("AAPL", 1, Some(dec!(1)))).unwrap();
        assert_eq!(metrics.bars_finalized("1t"), 2);
    }
}
