//! Error types for the streamer

use thiserror::Error;

use crate::events::EventType;
use crate::websocket::TransportState;

/// Streamer errors
#[derive(Error, Debug)]
pub enum StreamerError {
    #[error(
        "Malformed {event_type} frame: {actual} values is not a positive multiple of {field_count} fields"
    )]
    MalformedFrame {
        event_type: EventType,
        field_count: usize,
        actual: usize,
    },

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Not connected: subscription commands require a connected transport (state: {state:?})")]
    NotConnected { state: TransportState },

    #[error("Handshake failed: {0}")]
    HandshakeFailure(String),

    #[error("Invalid timeframe: {0:?}")]
    InvalidTimeframe(String),

    #[error("Transport disconnected: {0}")]
    Disconnected(String),

    #[error("Trade for {symbol} carries no price")]
    MissingPrice { symbol: String },

    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamerError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for StreamerError {
    fn from(err: serde_json::Error) -> Self {
        StreamerError::ParseError(err.to_string())
    }
}

impl From<prometheus::Error> for StreamerError {
    fn from(err: prometheus::Error) -> Self {
        StreamerError::MetricsError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StreamerError>;
