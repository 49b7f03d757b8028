//! Message sinks.

use tokio::sync::mpsc;

use crate::application::ports::{MessageOrigin, MessageSink};
use crate::domain::streaming::FeedMessage;

use super::{UNKNOWN_CHANNEL, record_message_received};

/// Counts every message and logs it at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl MetricsSink {
    /// Create a new metrics sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageSink for MetricsSink {
    fn accept(&self, origin: &MessageOrigin, message: FeedMessage) {
        let channel = message.channel().map_or(UNKNOWN_CHANNEL, |c| c.as_str());
        record_message_received(channel, origin.user.as_deref());

        if message.is_error() {
            tracing::warn!(
                bundle = origin.bundle,
                user = origin.user.as_deref(),
                message = ?message.rest.get("message"),
                "Feed reported an error"
            );
            return;
        }

        tracing::debug!(
            bundle = origin.bundle,
            user = origin.user.as_deref(),
            kind = %message.kind,
            product_id = message.product_id.as_deref(),
            sequence = message.sequence,
            "Feed message received"
        );
    }
}

/// Forwards every message, with its origin, into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(MessageOrigin, FeedMessage)>,
}

impl ChannelSink {
    /// Create a sink and the receiver its messages arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(MessageOrigin, FeedMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn accept(&self, origin: &MessageOrigin, message: FeedMessage) {
        if self.tx.send((origin.clone(), message)).is_err() {
            tracing::trace!(bundle = origin.bundle, "Sink receiver dropped");
        }
    }
}
