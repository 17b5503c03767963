//! Streaming credentials and the outgoing auth extension
//!
//! Tokens are issued by the REST session, which lives outside this crate. The
//! transport only needs the token and the endpoint to connect to.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::websocket::BayeuxMessage;

/// Extension key the feed reads the bearer token from
pub const AUTH_TOKEN_KEY: &str = "com.devexperts.auth.AuthToken";

/// Token and endpoint for one streaming session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamerCredentials {
    pub token: String,
    pub url: String,
}

/// Source of streaming credentials
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn credentials(&self) -> Result<StreamerCredentials>;
}

/// Provider handing out a fixed token, e.g. one read from the environment
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    credentials: StreamerCredentials,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            credentials: StreamerCredentials {
                token: token.into(),
                url: url.into(),
            },
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn credentials(&self) -> Result<StreamerCredentials> {
        Ok(self.credentials.clone())
    }
}

/// Stamps the auth token on messages sent before a client id is assigned
#[derive(Clone)]
pub struct AuthExtension {
    token: String,
}

impl AuthExtension {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Add the token to `message` unless it already carries a client id or a token
    ///
    /// Returns whether the message was modified.
    pub fn stamp(&self, message: &mut BayeuxMessage) -> bool {
        if message.client_id.is_some() {
            return false;
        }
        let ext = message.ext.get_or_insert_with(Default::default);
        if ext.contains_key(AUTH_TOKEN_KEY) {
            return false;
        }
        ext.insert(AUTH_TOKEN_KEY.to_string(), Value::String(self.token.clone()));
        true
    }
}

impl std::fmt::Debug for AuthExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthExtension")
            .field("token", &"<redacted>")
            .finish()
    }
}
