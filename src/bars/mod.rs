//! OHLCV bar aggregation
//!
//! Folds trade ticks into bars, either every N ticks or per fixed time bucket.

mod aggregator;
mod manager;
mod timeframe;

pub use aggregator::OhlcvBars;
pub use manager::BarManager;
pub use timeframe::Timeframe;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One open/high/low/close/volume bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Last size reported within the bar
    pub volume: Option<i64>,
    pub tick_count: u64,
    /// Bucket start in time mode, first tick time in tick mode (epoch ms)
    pub timestamp: i64,
}

impl OhlcvBar {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}
