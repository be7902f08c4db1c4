//! Transport establishment.
//!
//! The event loop only needs a bidirectional stream of websocket
//! [`Message`]s. [`Connector`] is the seam that produces one; the default
//! [`WebSocketConnector`] dials the endpoint over TLS.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// FrameStream
// ============================================================================

/// A bidirectional websocket message stream.
///
/// Implemented for any `WebSocketStream` and for in-memory test pairs.
pub trait FrameStream:
    Stream<Item = std::result::Result<Message, WsError>>
    + Sink<Message, Error = WsError>
    + Send
    + Unpin
    + 'static
{
}

impl<T> FrameStream for T where
    T: Stream<Item = std::result::Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Send
        + Unpin
        + 'static
{
}

/// Type-erased [`FrameStream`].
pub type BoxedFrameStream = Box<dyn FrameStream>;

// ============================================================================
// Connector
// ============================================================================

/// Opens the physical connection for a socket.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `url` and returns an open message stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the transport cannot be opened.
    async fn connect(&self, url: &Url) -> Result<BoxedFrameStream>;
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Default connector: a websocket client over TCP, with TLS for `wss`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<BoxedFrameStream> {
        // Already installed is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        debug!(host = url.host_str().unwrap_or_default(), "Connecting websocket");

        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(e.to_string()))?;

        info!(status = %response.status(), "WebSocket handshake completed");

        Ok(Box::new(stream))
    }
}

// ============================================================================
// Tests
// ============================================================================
