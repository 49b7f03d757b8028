//! Connection Supervisor
//!
//! Turns planned [`SubscriptionBundle`]s into live connections, one per
//! bundle, and runs one read loop per connection.
//!
//! # Startup
//!
//! Bundles are processed strictly in plan order. For each one the
//! supervisor dials, sends the subscribe request, waits for a single
//! acknowledgement and validates it. Startup is all-or-nothing: the first
//! failure closes every connection opened by the same `start` call and is
//! returned as a [`StartupError`] naming the bundle and the step.
//!
//! # Shutdown
//!
//! `stop` closes every recorded connection (best-effort, one at a time),
//! which makes each pending `receive` fail and its read loop exit, then
//! waits for every read loop to finish.
//!
//! `start` and `stop` must not run concurrently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::task::TaskTracker;

use crate::application::ports::{
    FeedConnection, FeedDialer, MessageOrigin, MessageSink, TransportError,
};
use crate::domain::handshake::{Acknowledgement, HandshakeError, validate_ack};
use crate::domain::planning::SubscriptionBundle;
use crate::infrastructure::metrics;

use super::codec::{CodecError, JsonCodec};

// =============================================================================
// Errors
// =============================================================================

/// Why a `start` call failed. Every variant names the bundle (plan index)
/// that failed.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The subscribe request could not be encoded.
    #[error("bundle {bundle}: encode failed: {source}")]
    Encode {
        /// Bundle index.
        bundle: usize,
        /// Underlying error.
        source: CodecError,
    },

    /// The connection could not be established.
    #[error("bundle {bundle}: dial failed: {source}")]
    Dial {
        /// Bundle index.
        bundle: usize,
        /// Underlying error.
        source: TransportError,
    },

    /// The subscribe request could not be sent.
    #[error("bundle {bundle}: send failed: {source}")]
    Send {
        /// Bundle index.
        bundle: usize,
        /// Underlying error.
        source: TransportError,
    },

    /// No acknowledgement could be read.
    #[error("bundle {bundle}: receive failed: {source}")]
    Receive {
        /// Bundle index.
        bundle: usize,
        /// Underlying error.
        source: TransportError,
    },

    /// The acknowledgement was not a valid reply.
    #[error("bundle {bundle}: decode failed: {source}")]
    Decode {
        /// Bundle index.
        bundle: usize,
        /// Underlying error.
        source: CodecError,
    },

    /// The acknowledgement did not confirm the request.
    #[error("bundle {bundle}: handshake failed: {source}")]
    Handshake {
        /// Bundle index.
        bundle: usize,
        /// Underlying error.
        source: HandshakeError,
    },

    /// A step did not finish within the handshake timeout.
    #[error("bundle {bundle}: {step} timed out")]
    Timeout {
        /// Bundle index.
        bundle: usize,
        /// Step that timed out (`dial`, `send` or `receive`).
        step: &'static str,
    },
}

impl StartupError {
    /// Index of the bundle that failed.
    #[must_use]
    pub const fn bundle(&self) -> usize {
        match self {
            Self::Encode { bundle, .. }
            | Self::Dial { bundle, .. }
            | Self::Send { bundle, .. }
            | Self::Receive { bundle, .. }
            | Self::Decode { bundle, .. }
            | Self::Handshake { bundle, .. }
            | Self::Timeout { bundle, .. } => *bundle,
        }
    }

    /// Metric label for the failing step.
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::Encode { .. } => "encode",
            Self::Dial { .. } => "dial",
            Self::Send { .. } => "send",
            Self::Receive { .. } => "receive",
            Self::Decode { .. } => "decode",
            Self::Handshake { .. } => "handshake",
            Self::Timeout { .. } => "timeout",
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Default bound on each startup step.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Supervisor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Bound on each of dial, send and acknowledgement receive. `None`
    /// waits indefinitely.
    pub handshake_timeout: Option<Duration>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
        }
    }
}

// =============================================================================
// Supervisor
// =============================================================================

struct ConnectionHandle {
    bundle: usize,
    connection: Arc<dyn FeedConnection>,
}

/// Opens, subscribes and supervises one connection per bundle.
pub struct ConnectionSupervisor {
    dialer: Arc<dyn FeedDialer>,
    feed_url: String,
    sink: Arc<dyn MessageSink>,
    codec: JsonCodec,
    settings: SupervisorSettings,
    handles: Mutex<Vec<ConnectionHandle>>,
    tracker: TaskTracker,
}

impl ConnectionSupervisor {
    /// Create a supervisor dialing `feed_url` and handing messages to `sink`.
    #[must_use]
    pub fn new(
        dialer: Arc<dyn FeedDialer>,
        feed_url: impl Into<String>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            dialer,
            feed_url: feed_url.into(),
            sink,
            codec: JsonCodec::new(),
            settings: SupervisorSettings::default(),
            handles: Mutex::new(Vec::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Replace the default settings.
    #[must_use]
    pub fn with_settings(mut self, settings: SupervisorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Number of connections currently recorded.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Number of read loops still running.
    #[must_use]
    pub fn active_read_loops(&self) -> usize {
        self.tracker.len()
    }

    /// Open and subscribe one connection per bundle, in order.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Every connection opened by this call has
    /// been closed by the time it returns.
    pub async fn start(&self, bundles: &[SubscriptionBundle]) -> Result<(), StartupError> {
        let base = self.handles.lock().len();

        for (index, bundle) in bundles.iter().enumerate() {
            match self.subscribe(index, bundle).await {
                Ok(connection) => {
                    tracing::info!(
                        bundle = index,
                        channels = ?bundle.channel_names(),
                        user = bundle.user_name.as_deref(),
                        "Subscription confirmed"
                    );
                    metrics::record_connection_opened();

                    self.spawn_read_loop(index, bundle, Arc::clone(&connection));
                    self.handles.lock().push(ConnectionHandle {
                        bundle: index,
                        connection,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        bundle = index,
                        step = e.step(),
                        error = %e,
                        "Startup failed, closing opened connections"
                    );
                    metrics::record_handshake_failure(e.step());

                    let opened = {
                        let mut handles = self.handles.lock();
                        let keep = base.min(handles.len());
                        handles.split_off(keep)
                    };
                    close_all(&opened).await;

                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Close every connection and wait for every read loop to exit.
    ///
    /// Safe to call before `start`, after a failed `start`, or twice.
    pub async fn stop(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        if !handles.is_empty() {
            tracing::info!(connections = handles.len(), "Closing feed connections");
        }
        close_all(&handles).await;

        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Dial and subscribe one bundle. The connection is closed on failure.
    async fn subscribe(
        &self,
        index: usize,
        bundle: &SubscriptionBundle,
    ) -> Result<Arc<dyn FeedConnection>, StartupError> {
        let request = self
            .codec
            .encode_request(bundle)
            .map_err(|source| StartupError::Encode {
                bundle: index,
                source,
            })?;

        tracing::debug!(bundle = index, url = %self.feed_url, "Dialing");
        let connection = self
            .bounded(index, "dial", self.dialer.dial(&self.feed_url))
            .await?
            .map_err(|source| StartupError::Dial {
                bundle: index,
                source,
            })?;

        if let Err(e) = self.handshake(index, bundle, connection.as_ref(), request).await {
            if let Err(close_err) = connection.close().await {
                tracing::warn!(bundle = index, error = %close_err, "Close failed");
            }
            return Err(e);
        }

        Ok(connection)
    }

    async fn handshake(
        &self,
        index: usize,
        bundle: &SubscriptionBundle,
        connection: &dyn FeedConnection,
        request: String,
    ) -> Result<(), StartupError> {
        self.bounded(index, "send", connection.send(request))
            .await?
            .map_err(|source| StartupError::Send {
                bundle: index,
                source,
            })?;

        let text = self
            .bounded(index, "receive", connection.receive())
            .await?
            .map_err(|source| StartupError::Receive {
                bundle: index,
                source,
            })?;

        let reply = self
            .codec
            .decode_reply(&text)
            .map_err(|source| StartupError::Decode {
                bundle: index,
                source,
            })?;

        if reply.message.is_some() || reply.reason.is_some() {
            tracing::warn!(
                bundle = index,
                message = reply.message.as_deref(),
                reason = reply.reason.as_deref(),
                "Server replied with an error"
            );
        }

        validate_ack(bundle, &Acknowledgement::from(reply)).map_err(|source| {
            StartupError::Handshake {
                bundle: index,
                source,
            }
        })
    }

    /// Run `step` under the handshake timeout, if one is set.
    async fn bounded<T>(
        &self,
        index: usize,
        step: &'static str,
        fut: impl Future<Output = T> + Send,
    ) -> Result<T, StartupError> {
        match self.settings.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| StartupError::Timeout {
                    bundle: index,
                    step,
                }),
            None => Ok(fut.await),
        }
    }

    fn spawn_read_loop(
        &self,
        index: usize,
        bundle: &SubscriptionBundle,
        connection: Arc<dyn FeedConnection>,
    ) {
        let origin = MessageOrigin {
            bundle: index,
            user: bundle.user_name.clone(),
        };
        self.tracker.spawn(read_loop(
            connection,
            self.codec.clone(),
            Arc::clone(&self.sink),
            origin,
        ));
    }
}

/// Receive, decode and forward until the connection fails or is closed.
async fn read_loop(
    connection: Arc<dyn FeedConnection>,
    codec: JsonCodec,
    sink: Arc<dyn MessageSink>,
    origin: MessageOrigin,
) {
    loop {
        let text = match connection.receive().await {
            Ok(text) => text,
            Err(TransportError::Closed) => {
                tracing::info!(bundle = origin.bundle, "Connection closed, read loop exiting");
                break;
            }
            Err(e) => {
                tracing::warn!(bundle = origin.bundle, error = %e, "Receive failed, read loop exiting");
                metrics::record_read_error(origin.bundle);
                break;
            }
        };

        match codec.decode_feed(&text) {
            Ok(message) => sink.accept(&origin, message),
            Err(e) => {
                tracing::warn!(bundle = origin.bundle, error = %e, "Undecodable frame, read loop exiting");
                metrics::record_read_error(origin.bundle);
                break;
            }
        }
    }

    metrics::record_connection_closed();
}

/// Close each connection independently; failures are logged and skipped.
async fn close_all(handles: &[ConnectionHandle]) {
    for handle in handles {
        if let Err(e) = handle.connection.close().await {
            tracing::warn!(bundle = handle.bundle, error = %e, "Close failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
