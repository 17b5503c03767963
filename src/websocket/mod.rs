//! WebSocket module for the CometD streaming connection

mod client;
pub mod protocol;
mod reader;

pub use client::Transport;
pub use protocol::{Advice, BayeuxMessage, Channel};
pub use reader::Inbound;

use serde::Serialize;

/// Lifecycle of a transport; `Disconnected` is terminal once reached after open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportState {
    Disconnected,
    Handshaking,
    Connected,
    Subscribed,
}

impl TransportState {
    /// Whether subscription commands may be sent
    pub fn is_connected(&self) -> bool {
        matches!(self, TransportState::Connected | TransportState::Subscribed)
    }
}
