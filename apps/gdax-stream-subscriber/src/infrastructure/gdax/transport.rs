//! Websocket Transport
//!
//! [`FeedDialer`]/[`FeedConnection`] adapters over `tokio-tungstenite`.
//!
//! The stream is split so a read loop can wait on the read half while the
//! supervisor sends or closes through the write half. A per-connection
//! [`CancellationToken`] makes `close` unblock a pending `receive`
//! regardless of what the peer does with the close frame.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedConnection, FeedDialer, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Dialer
// =============================================================================

/// Dials websocket connections with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsDialer;

impl WsDialer {
    /// Create a new dialer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FeedDialer for WsDialer {
    async fn dial(&self, url: &str) -> Result<Arc<dyn FeedConnection>, TransportError> {
        tracing::debug!(url, "Dialing feed");

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Arc::new(WsConnection::new(stream)))
    }
}

// =============================================================================
// Connection
// =============================================================================

/// One websocket connection.
pub struct WsConnection {
    write: Mutex<SplitSink<WsStream, Message>>,
    read: Mutex<SplitStream<WsStream>>,
    closed: CancellationToken,
}

impl WsConnection {
    fn new(stream: WsStream) -> Self {
        let (write, read) = stream.split();
        Self {
            write: Mutex::new(write),
            read: Mutex::new(read),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        self.write
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn receive(&self) -> Result<String, TransportError> {
        let mut read = tokio::select! {
            () = self.closed.cancelled() => return Err(TransportError::Closed),
            guard = self.read.lock() => guard,
        };

        loop {
            let frame = tokio::select! {
                () = self.closed.cancelled() => return Err(TransportError::Closed),
                frame = read.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(_))) => {
                    return Err(TransportError::Receive(
                        "unexpected binary frame".to_string(),
                    ));
                }
                // tungstenite queues the pong reply itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Server sent close frame");
                    self.closed.cancel();
                    return Err(TransportError::Closed);
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    self.closed.cancel();
                    return Err(TransportError::Closed);
                }
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();

        match self.write.lock().await.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Close(e.to_string())),
        }
    }
}
