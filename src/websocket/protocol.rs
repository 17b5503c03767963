//! CometD (Bayeux) message types
//!
//! Every message names the logical channel it travels on. Meta channels carry
//! the session lifecycle, `/service/sub` carries subscription commands and the
//! two data channels carry event frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, StreamerError};

pub const BAYEUX_VERSION: &str = "1.0";
pub const CONNECTION_TYPE: &str = "websocket";

/// Liveness advice sent with the handshake
pub const ADVICE_INTERVAL_MS: u64 = 0;
pub const ADVICE_TIMEOUT_MS: u64 = 60_000;

/// Logical channel of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Channel {
    Handshake,
    Connect,
    Disconnect,
    Subscription,
    Data,
    TimeSeriesData,
    Other(String),
}

impl Channel {
    pub fn path(&self) -> &str {
        match self {
            Channel::Handshake => "/meta/handshake",
            Channel::Connect => "/meta/connect",
            Channel::Disconnect => "/meta/disconnect",
            Channel::Subscription => "/service/sub",
            Channel::Data => "/service/data",
            Channel::TimeSeriesData => "/service/timeSeriesData",
            Channel::Other(path) => path.as_str(),
        }
    }

    /// Only these channels carry decodable market events
    pub fn is_data(&self) -> bool {
        matches!(self, Channel::Data | Channel::TimeSeriesData)
    }

    pub fn is_meta(&self) -> bool {
        self.path().starts_with("/meta/")
    }
}

impl From<String> for Channel {
    fn from(path: String) -> Self {
        let normalized = path.trim_start_matches('/');
        match normalized {
            "meta/handshake" => Channel::Handshake,
            "meta/connect" => Channel::Connect,
            "meta/disconnect" => Channel::Disconnect,
            "service/sub" => Channel::Subscription,
            "service/data" => Channel::Data,
            "service/timeSeriesData" => Channel::TimeSeriesData,
            _ => Channel::Other(path),
        }
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Other(path) => path,
            known => known.path().to_string(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Reconnect advice exchanged on meta channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// `retry`, `handshake` or `none`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<String>,
}

/// A single Bayeux message, in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BayeuxMessage {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BayeuxMessage {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            id: None,
            client_id: None,
            version: None,
            minimum_version: None,
            supported_connection_types: None,
            connection_type: None,
            advice: None,
            data: None,
            ext: None,
            successful: None,
            error: None,
        }
    }

    pub fn handshake() -> Self {
        Self {
            version: Some(BAYEUX_VERSION.to_string()),
            minimum_version: Some(BAYEUX_VERSION.to_string()),
            supported_connection_types: Some(vec![CONNECTION_TYPE.to_string()]),
            advice: Some(Advice {
                interval: Some(ADVICE_INTERVAL_MS),
                timeout: Some(ADVICE_TIMEOUT_MS),
                reconnect: None,
            }),
            ..Self::new(Channel::Handshake)
        }
    }

    pub fn connect(client_id: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            connection_type: Some(CONNECTION_TYPE.to_string()),
            ..Self::new(Channel::Connect)
        }
    }

    pub fn disconnect(client_id: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            ..Self::new(Channel::Disconnect)
        }
    }

    pub fn publish(channel: Channel, client_id: &str, data: Value) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            data: Some(data),
            ..Self::new(channel)
        }
    }

    pub fn is_successful(&self) -> bool {
        self.successful == Some(true)
    }

    /// Whether the server advises against reusing this session
    pub fn advises_rehandshake(&self) -> bool {
        self.advice
            .as_ref()
            .and_then(|a| a.reconnect.as_deref())
            .is_some_and(|r| r == "handshake" || r == "none")
    }
}

/// Encode outgoing messages; Bayeux batches are JSON arrays
pub fn encode(messages: &[BayeuxMessage]) -> Result<String> {
    Ok(serde_json::to_string(messages)?)
}

/// Decode an inbound text payload holding one message or a batch
pub fn decode(text: &str) -> Result<Vec<BayeuxMessage>> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(StreamerError::from))
            .collect(),
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        other => Err(StreamerError::ParseError(format!(
            "expected a Bayeux message or batch, got {other}"
        ))),
    }
}
