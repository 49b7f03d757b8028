//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FeedDialer` / `FeedConnection`: bidirectional text channel to the feed
//! - `MessageSink`: destination for decoded feed messages
//!
//! A connection must tolerate `close` while a `receive` is pending on
//! another task; the pending `receive` then fails with
//! [`TransportError::Closed`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::streaming::FeedMessage;

// =============================================================================
// Error Types
// =============================================================================

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Could not write a frame.
    #[error("send failed: {0}")]
    Send(String),

    /// Could not read a frame.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The connection was closed, locally or by the peer.
    #[error("connection closed")]
    Closed,

    /// Closing the connection failed.
    #[error("close failed: {0}")]
    Close(String),
}

// =============================================================================
// Transport
// =============================================================================

/// One open connection carrying JSON text frames.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedConnection: Send + Sync {
    /// Send one text frame.
    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Wait for the next text frame.
    async fn receive(&self) -> Result<String, TransportError>;

    /// Close the connection. Safe to call while a `receive` is pending.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Opens connections to the feed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedDialer: Send + Sync {
    /// Dial `url`.
    async fn dial(&self, url: &str) -> Result<Arc<dyn FeedConnection>, TransportError>;
}

// =============================================================================
// Message Sink
// =============================================================================

/// Where a message was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOrigin {
    /// Index of the bundle (and connection) in plan order.
    pub bundle: usize,
    /// Authenticated user of the connection, if any.
    pub user: Option<String>,
}

/// Consumer of decoded feed messages.
pub trait MessageSink: Send + Sync {
    /// Handle one message. Called in receipt order per connection.
    fn accept(&self, origin: &MessageOrigin, message: FeedMessage);
}
