//! Feed Message Types
//!
//! Minimal decoding of the data messages streamed after subscribing.
//! Only the fields needed to route and label a message are typed; the
//! rest of the payload is kept as raw JSON for the sink.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::subscription::ChannelName;

/// A data message received on a subscribed connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedMessage {
    /// Message type (`ticker`, `snapshot`, `l2update`, `match`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Instrument the message refers to.
    #[serde(default)]
    pub product_id: Option<String>,
    /// Per-product sequence number.
    #[serde(default)]
    pub sequence: Option<u64>,
    /// Server timestamp.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    /// Price, for messages that carry one.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Remaining payload fields.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl FeedMessage {
    /// Channel that produces this message type, if it is a data message.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelName> {
        match self.kind.as_str() {
            "ticker" => Some(ChannelName::Ticker),
            "snapshot" | "l2update" => Some(ChannelName::Level2),
            "received" | "open" | "done" | "match" | "change" | "activate" => {
                Some(ChannelName::User)
            }
            _ => None,
        }
    }

    /// Whether the server reported an error on the connection.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }
}
