//! Configuration module for the streamer

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::bars::Timeframe;
use crate::error::{Result, StreamerError};

/// Streamer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamerConfig {
    /// CometD endpoint, e.g. `wss://tasty-openapi-ws.dxfeed.com/realtime`
    pub url: String,

    /// Streaming token issued by the REST session
    pub token: String,

    /// Symbols to subscribe to
    pub symbols: Vec<String>,

    /// Bar timeframes to aggregate per symbol
    pub timeframes: Vec<String>,

    /// Bound on handshake plus the first connect reply
    pub handshake_timeout: Duration,

    /// Capacity of the inbound message queue
    pub event_queue_capacity: usize,

    /// How long the binary streams before shutting down
    pub run_duration: Duration,

    pub health_port: u16,
}

impl StreamerConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            url: env::var("STREAMER_URL").unwrap_or(defaults.url),
            token: env::var("STREAMER_TOKEN").unwrap_or(defaults.token),
            symbols: env::var("SYMBOLS")
                .map(|s| split_list(&s, true))
                .unwrap_or(defaults.symbols),
            timeframes: env::var("TIMEFRAMES")
                .map(|s| split_list(&s, false))
                .unwrap_or(defaults.timeframes),
            handshake_timeout: Duration::from_millis(parse_var("HANDSHAKE_TIMEOUT_MS", 10_000)),
            event_queue_capacity: parse_var("EVENT_QUEUE_CAPACITY", defaults.event_queue_capacity),
            run_duration: Duration::from_secs(parse_var("RUN_DURATION_SECS", 60)),
            health_port: parse_var("HEALTH_PORT", defaults.health_port),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(StreamerError::ConfigError("STREAMER_URL is empty".to_string()));
        }
        if self.event_queue_capacity == 0 {
            return Err(StreamerError::ConfigError(
                "EVENT_QUEUE_CAPACITY must be positive".to_string(),
            ));
        }
        for timeframe in &self.timeframes {
            Timeframe::parse(timeframe)?;
        }
        Ok(())
    }
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            url: "wss://tasty-openapi-ws.dxfeed.com/realtime".to_string(),
            token: String::new(),
            symbols: vec!["SPY".to_string()],
            timeframes: vec!["1m".to_string()],
            handshake_timeout: Duration::from_secs(10),
            event_queue_capacity: 1024,
            run_duration: Duration::from_secs(60),
            health_port: 9090,
        }
    }
}

fn split_list(raw: &str, uppercase: bool) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if uppercase { s.to_uppercase() } else { s.to_string() })
        .collect()
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StreamerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.event_queue_capacity, 1024);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" spy, aapl ,,", true), vec!["SPY", "AAPL"]);
        assert_eq!(split_list("1m,5t", false), vec!["1m", "5t"]);
    }

    #[test]
    fn test_validate_rejects_bad_timeframe() {
        let config = StreamerConfig {
            timeframes: vec!["1m".to_string(), "3m".to_string()],
            ..StreamerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StreamerError::InvalidTimeframe(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_queue() {
        let config = StreamerConfig {
            event_queue_capacity: 0,
            ..StreamerConfig::default()
        };
        assert!(matches!(config.validate(), Err(StreamerError::ConfigError(_))));
    }
}
