//! GDAX Websocket Message Types
//!
//! Wire format of the subscribe handshake. The same shape is used in both
//! directions: the client sends `type: "subscribe"`, the server answers
//! `type: "subscriptions"` (or `type: "error"` with a message).
//!
//! Optional fields are omitted entirely when empty, never sent as `null`
//! or `""`.
//!
//! # References
//!
//! - [Websocket Feed](https://docs.gdax.com/#websocket-feed)

use serde::{Deserialize, Serialize};

use crate::domain::handshake::{AckChannel, Acknowledgement};
use crate::domain::planning::SubscriptionBundle;

/// Message type of an outbound subscribe request.
pub const SUBSCRIBE_TYPE: &str = "subscribe";

/// One channel entry on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    /// Channel name.
    pub name: String,
    /// Channel specific pairs.
    #[serde(default, rename = "product_ids", skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<String>,
}

/// Subscribe request, or the server's acknowledgement of one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscribeMessage {
    /// `subscribe`, `subscriptions` or `error`.
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Pairs applied to every channel.
    #[serde(default, rename = "product_ids", skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<String>,

    /// Channel entries.
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,

    /// API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Base64 HMAC signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// API passphrase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    /// Unix seconds the signature was computed at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Error summary, on `error` replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Error detail, on `error` replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&SubscriptionBundle> for SubscribeMessage {
    fn from(bundle: &SubscriptionBundle) -> Self {
        let auth = bundle.auth.as_ref();
        Self {
            msg_type: SUBSCRIBE_TYPE.to_string(),
            pairs: bundle.global_pairs.clone(),
            channels: bundle
                .channels
                .iter()
                .map(|c| ChannelEntry {
                    name: c.name.as_str().to_string(),
                    pairs: c.pairs.clone(),
                })
                .collect(),
            key: auth.map(|a| a.key.clone()),
            signature: auth.map(|a| a.signature.clone()),
            passphrase: auth.map(|a| a.passphrase.clone()),
            timestamp: auth.map(|a| a.timestamp.clone()),
            message: None,
            reason: None,
        }
    }
}

impl From<SubscribeMessage> for Acknowledgement {
    fn from(msg: SubscribeMessage) -> Self {
        Self {
            kind: msg.msg_type,
            channels: msg
                .channels
                .into_iter()
                .map(|c| AckChannel {
                    name: c.name,
                    pairs: c.pairs,
                })
                .collect(),
        }
    }
}
