//! Builder pattern for socket configuration.
//!
//! Provides a fluent API for configuring and creating [`RealtimeSocket`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use realtime_socket::RealtimeSocket;
//!
//! # fn example() -> realtime_socket::Result<()> {
//! let socket = RealtimeSocket::builder()
//!     .api_key("anon-key")
//!     .heartbeat_interval(Duration::from_secs(15))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Connector, WebSocketConnector};

use super::core::RealtimeSocket;
use super::options::{
    DEFAULT_ENDPOINT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_PROTOCOL_VERSION, SocketOptions,
};

// ============================================================================
// SocketBuilder
// ============================================================================

/// Builder for configuring a [`RealtimeSocket`].
///
/// Use [`RealtimeSocket::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct SocketBuilder {
    /// Websocket endpoint.
    endpoint: Option<String>,
    /// Project API key.
    api_key: Option<String>,
    /// Protocol version marker.
    protocol_version: Option<String>,
    /// Heartbeat period.
    heartbeat_interval: Option<Duration>,
    /// Reply wait bound.
    reply_timeout: Option<Duration>,
    /// Transport factory.
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for SocketBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketBuilder")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("protocol_version", &self.protocol_version)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("reply_timeout", &self.reply_timeout)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// SocketBuilder Implementation
// ============================================================================

impl SocketBuilder {
    /// Creates a new builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the websocket endpoint (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the project API key.
    #[inline]
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the protocol version marker.
    #[inline]
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = Some(version.into());
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Bounds how long a caller waits for a reply.
    ///
    /// Without this, a caller waits until the reply arrives or the
    /// connection closes.
    #[inline]
    #[must_use]
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    /// Replaces the default websocket connector.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Builds the socket with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the API key is missing or empty
    /// - [`Error::Url`] if the endpoint does not parse
    /// - [`Error::Config`] if the endpoint is not `ws`/`wss`
    /// - [`Error::Config`] if a heartbeat or reply timeout is zero
    pub fn build(self) -> Result<RealtimeSocket> {
        let endpoint = self.validate_endpoint()?;
        let api_key = self.validate_api_key()?;
        let heartbeat_interval = self.heartbeat_interval.unwrap_or(DEFAULT_HEARTBEAT_INTERVAL);

        if heartbeat_interval.is_zero() {
            return Err(Error::config("heartbeat interval must be non-zero"));
        }
        if self.reply_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("reply timeout must be non-zero"));
        }

        let options = SocketOptions {
            endpoint,
            api_key,
            protocol_version: self
                .protocol_version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            heartbeat_interval,
            reply_timeout: self.reply_timeout,
        };

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector));

        Ok(RealtimeSocket::new(options, connector))
    }

    /// Validates the endpoint URL.
    fn validate_endpoint(&self) -> Result<Url> {
        let url = Url::parse(self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::config(format!(
                "endpoint scheme must be ws or wss, got {other}"
            ))),
        }
    }

    /// Validates the API key.
    fn validate_api_key(&self) -> Result<String> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(Error::config(
                "API key is required. Use .api_key(\"...\")",
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
