//! dxfeed Streamer Library
//!
//! Streams market events over a CometD WebSocket session, decodes the compact
//! dxfeed frame format into typed events and folds trades into OHLCV bars.

pub mod auth;
pub mod bars;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod metrics;
pub mod parser;
pub mod session;
pub mod subscription;
pub mod websocket;

pub use auth::{StaticTokenProvider, StreamerCredentials, TokenProvider};
pub use bars::{BarManager, OhlcvBar, OhlcvBars, Timeframe};
pub use config::StreamerConfig;
pub use dispatcher::EventStream;
pub use error::{Result, StreamerError};
pub use events::{EventType, MarketEvent};
pub use metrics::StreamMetrics;
pub use parser::{decode, ParsedMessage};
pub use session::Streamer;
pub use subscription::{ControlChannel, SubscriptionCommand, SubscriptionRegistry};
pub use websocket::{Transport, TransportState};
