//! Stream Codec Module
//!
//! JSON encoding and decoding for the GDAX websocket feed. Every frame is
//! a single JSON object; there is no batching.

use crate::domain::planning::SubscriptionBundle;
use crate::domain::streaming::FeedMessage;

use super::messages::SubscribeMessage;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the subscribe handshake and data messages.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a bundle as a subscribe request frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (should not happen with valid data).
    pub fn encode_request(&self, bundle: &SubscriptionBundle) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&SubscribeMessage::from(bundle))?)
    }

    /// Decode the server's reply to a subscribe request.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object of the expected shape.
    pub fn decode_reply(&self, text: &str) -> Result<SubscribeMessage, CodecError> {
        let trimmed = Self::object(text)?;
        Ok(serde_json::from_str(trimmed)?)
    }

    /// Decode a data message.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object with a `type`.
    pub fn decode_feed(&self, text: &str) -> Result<FeedMessage, CodecError> {
        let trimmed = Self::object(text)?;
        Ok(serde_json::from_str(trimmed)?)
    }

    fn object(text: &str) -> Result<&str, CodecError> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            Ok(trimmed)
        } else {
            Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )))
        }
    }
}
