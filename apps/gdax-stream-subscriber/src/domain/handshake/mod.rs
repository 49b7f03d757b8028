//! Subscription Handshake Validation
//!
//! After sending a subscribe request the feed answers with a
//! `subscriptions` message listing what it actually subscribed. The
//! server folds the global pairs into each channel, so every acknowledged
//! channel must carry exactly its effective pairs plus the bundle's
//! global pairs. Order is not significant.

use thiserror::Error;

use super::planning::{BundleChannel, SubscriptionBundle};
use super::subscription::Pair;

/// Message type of a subscription acknowledgement.
pub const ACK_TYPE: &str = "subscriptions";

// =============================================================================
// Acknowledgement
// =============================================================================

/// One channel of an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckChannel {
    /// Channel name as returned by the server.
    pub name: String,
    /// Subscribed pairs.
    pub pairs: Vec<Pair>,
}

/// Server acknowledgement of a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Message type, expected to be [`ACK_TYPE`].
    pub kind: String,
    /// Subscribed channels.
    pub channels: Vec<AckChannel>,
}

// =============================================================================
// Error Types
// =============================================================================

/// Which part of a channel's pair set disagreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairMismatch {
    /// Different number of pairs.
    Length {
        /// Effective plus global pairs sent.
        expected: usize,
        /// Pairs acknowledged.
        actual: usize,
    },
    /// Same number of pairs, different contents.
    Content {
        /// First acknowledged pair that was not requested (or repeated).
        unexpected: Pair,
    },
}

impl std::fmt::Display for PairMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Length { expected, actual } => {
                write!(f, "expected {expected} pairs, got {actual}")
            }
            Self::Content { unexpected } => write!(f, "unexpected pair '{unexpected}'"),
        }
    }
}

/// Acknowledgement does not match the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// Message type was not `subscriptions`.
    #[error("unexpected acknowledgement type: '{0}'")]
    UnexpectedType(String),

    /// Different number of channels.
    #[error("channel count mismatch: sent {sent}, acknowledged {acknowledged}")]
    ChannelCountMismatch {
        /// Channels sent.
        sent: usize,
        /// Channels acknowledged.
        acknowledged: usize,
    },

    /// An acknowledged channel has no unique counterpart in the request.
    #[error("channel name mismatch: '{0}'")]
    ChannelNameMismatch(String),

    /// An acknowledged channel has the wrong pairs.
    #[error("pair mismatch on channel '{channel}': {detail}")]
    PairMismatch {
        /// Channel name.
        channel: String,
        /// What differed.
        detail: PairMismatch,
    },
}

// =============================================================================
// Validation
// =============================================================================

/// Check that `ack` confirms exactly what `sent` requested.
///
/// # Errors
///
/// Returns the first [`HandshakeError`] found.
pub fn validate_ack(sent: &SubscriptionBundle, ack: &Acknowledgement) -> Result<(), HandshakeError> {
    if ack.kind != ACK_TYPE {
        return Err(HandshakeError::UnexpectedType(ack.kind.clone()));
    }
    if ack.channels.len() != sent.channels.len() {
        return Err(HandshakeError::ChannelCountMismatch {
            sent: sent.channels.len(),
            acknowledged: ack.channels.len(),
        });
    }

    let mut matched = vec![false; sent.channels.len()];

    for acked in &ack.channels {
        let mut candidates = sent
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name.as_str() == acked.name);

        let (index, requested) = match (candidates.next(), candidates.next()) {
            (Some(found), None) if !matched[found.0] => found,
            _ => return Err(HandshakeError::ChannelNameMismatch(acked.name.clone())),
        };
        matched[index] = true;

        check_pairs(requested, &sent.global_pairs, acked)?;
    }

    Ok(())
}

/// Multiset comparison of acknowledged pairs against effective + global.
fn check_pairs(
    requested: &BundleChannel,
    global_pairs: &[Pair],
    acked: &AckChannel,
) -> Result<(), HandshakeError> {
    let mismatch = |detail| HandshakeError::PairMismatch {
        channel: acked.name.clone(),
        detail,
    };

    let expected_len = requested.pairs.len() + global_pairs.len();
    if acked.pairs.len() != expected_len {
        return Err(mismatch(PairMismatch::Length {
            expected: expected_len,
            actual: acked.pairs.len(),
        }));
    }

    let mut remaining: Vec<&Pair> = requested.pairs.iter().chain(global_pairs).collect();
    for pair in &acked.pairs {
        match remaining.iter().position(|p| *p == pair) {
            Some(i) => {
                remaining.swap_remove(i);
            }
            None => {
                return Err(mismatch(PairMismatch::Content {
                    unexpected: pair.clone(),
                }));
            }
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::ChannelName;

    fn pairs(items: &[&str]) -> Vec<Pair> {
        items.iter().map(ToString::to_string).collect()
    }

    fn bundle() -> SubscriptionBundle {
        SubscriptionBundle {
            channels: vec![
                BundleChannel {
                    name: ChannelName::Ticker,
                    pairs: vec![],
                },
                BundleChannel {
                    name: ChannelName::Level2,
                    pairs: pairs(&["BTC-USD"]),
                },
            ],
            global_pairs: pairs(&["ETH-USD", "LTC-USD"]),
            auth: None,
            user_name: None,
        }
    }

    fn ack_channel(name: &str, items: &[&str]) -> AckChannel {
        AckChannel {
            name: name.to_string(),
            pairs: pairs(items),
        }
    }

    fn matching_ack() -> Acknowledgement {
        Acknowledgement {
            kind: ACK_TYPE.to_string(),
            channels: vec![
                ack_channel("level2", &["LTC-USD", "BTC-USD", "ETH-USD"]),
                ack_channel("ticker", &["LTC-USD", "ETH-USD"]),
            ],
        }
    }

    #[test]
    fn accepts_union_in_any_order() {
        assert_eq!(validate_ack(&bundle(), &matching_ack()), Ok(()));
    }

    #[test]
    fn rejects_wrong_type() {
        let mut ack = matching_ack();
        ack.kind = "error".to_string();
        assert_eq!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::UnexpectedType("error".to_string()))
        );
    }

    #[test]
    fn rejects_missing_channel() {
        let mut ack = matching_ack();
        ack.channels.pop();
        assert!(matches!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::ChannelCountMismatch {
                sent: 2,
                acknowledged: 1
            })
        ));
    }

    #[test]
    fn rejects_extra_channel() {
        let mut ack = matching_ack();
        ack.channels.push(ack_channel("user", &["ETH-USD", "LTC-USD"]));
        assert!(matches!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::ChannelCountMismatch { .. })
        ));
    }

    #[test]
    fn rejects_renamed_channel() {
        let mut ack = matching_ack();
        ack.channels[1].name = "user".to_string();
        assert_eq!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::ChannelNameMismatch("user".to_string()))
        );
    }

    #[test]
    fn rejects_repeated_channel() {
        let mut ack = matching_ack();
        ack.channels[0] = ack_channel("ticker", &["LTC-USD", "ETH-USD"]);
        assert_eq!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::ChannelNameMismatch("ticker".to_string()))
        );
    }

    #[test]
    fn rejects_pair_count_mismatch() {
        let mut ack = matching_ack();
        ack.channels[1].pairs.pop();
        assert_eq!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::PairMismatch {
                channel: "ticker".to_string(),
                detail: PairMismatch::Length {
                    expected: 2,
                    actual: 1
                },
            })
        );
    }

    #[test]
    fn rejects_pair_content_mismatch() {
        let mut ack = matching_ack();
        ack.channels[0].pairs[1] = "XRP-USD".to_string();
        assert_eq!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::PairMismatch {
                channel: "level2".to_string(),
                detail: PairMismatch::Content {
                    unexpected: "XRP-USD".to_string()
                },
            })
        );
    }

    #[test]
    fn rejects_repeated_pair_with_matching_count() {
        let mut ack = matching_ack();
        ack.channels[1].pairs = pairs(&["ETH-USD", "ETH-USD"]);
        assert!(matches!(
            validate_ack(&bundle(), &ack),
            Err(HandshakeError::PairMismatch {
                detail: PairMismatch::Content { .. },
                ..
            })
        ));
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = HandshakeError::ChannelCountMismatch {
            sent: 3,
            acknowledged: 2,
        };
        assert_eq!(
            err.to_string(),
            "channel count mismatch: sent 3, acknowledged 2"
        );
    }
}
