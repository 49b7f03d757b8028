//! Subscription Planning
//!
//! Packs validated channels onto connections. The feed accepts at most
//! one authenticated identity per connection, so every `user` channel
//! after the first opens a new bundle. Public channels join whichever
//! bundle is current when they are reached in declaration order.
//!
//! ```text
//! ticker, level2, user(A), user(B)  =>  [ticker, level2, user(A)] [user(B)]
//! user(A), user(B), ticker, level2  =>  [user(A)] [user(B), ticker, level2]
//! ```
//!
//! Public channels are placed by position, not duplicated onto every
//! bundle. The acknowledgement check depends on this placement.

use thiserror::Error;

use super::signing::{AuthBlock, Clock, Signer, SignerError};
use super::subscription::{ChannelName, ChannelSubscription, Pair};
use super::validation::NormalizedConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// An identity could not be signed.
    #[error("failed to sign subscription for user '{user_name}': {source}")]
    Signing {
        /// User whose credentials failed.
        user_name: String,
        /// Underlying signer error.
        #[source]
        source: SignerError,
    },
}

// =============================================================================
// Bundle Types
// =============================================================================

/// One channel entry of a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleChannel {
    /// Channel name.
    pub name: ChannelName,
    /// Effective pairs (global pairs excluded).
    pub pairs: Vec<Pair>,
}

/// A self-contained subscribe request for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionBundle {
    /// Channels in declaration order.
    pub channels: Vec<BundleChannel>,
    /// Global pairs, applied to every channel of the bundle.
    pub global_pairs: Vec<Pair>,
    /// Authentication for the bundle's `user` channel, if any.
    pub auth: Option<AuthBlock>,
    /// User name of the authenticated identity, if any.
    pub user_name: Option<String>,
}

impl SubscriptionBundle {
    /// Whether the bundle carries an authenticated identity.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Channel names, for logging.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }
}

// =============================================================================
// Packing
// =============================================================================

/// Walk state while assigning channels to bundles.
#[derive(Debug, Default)]
struct Packing {
    assignments: Vec<usize>,
    current: usize,
    slot_occupied: bool,
}

impl Packing {
    fn place(mut self, channel: &ChannelSubscription) -> Self {
        if channel.name.is_authenticated() {
            if self.slot_occupied {
                self.current += 1;
            }
            self.slot_occupied = true;
        }
        self.assignments.push(self.current);
        self
    }

    const fn bundle_count(&self) -> usize {
        self.current + 1
    }
}

/// Bundle index for each channel, in declaration order.
#[must_use]
pub fn assign_bundles(channels: &[ChannelSubscription]) -> Vec<usize> {
    channels
        .iter()
        .fold(Packing::default(), Packing::place)
        .assignments
}

/// Build the ordered subscribe requests for a validated config.
///
/// # Errors
///
/// Returns [`PlanError::Signing`] if an identity cannot be signed.
pub fn plan<C: Clock>(
    config: &NormalizedConfig,
    signer: &Signer<C>,
) -> Result<Vec<SubscriptionBundle>, PlanError> {
    let packing = config
        .channels
        .iter()
        .fold(Packing::default(), Packing::place);

    let mut bundles: Vec<SubscriptionBundle> = (0..packing.bundle_count())
        .map(|_| SubscriptionBundle {
            channels: Vec::new(),
            global_pairs: config.global_pairs.clone(),
            auth: None,
            user_name: None,
        })
        .collect();

    for (channel, &index) in config.channels.iter().zip(&packing.assignments) {
        let bundle = &mut bundles[index];

        if let Some(identity) = &channel.identity {
            let auth = signer
                .authenticate(identity)
                .map_err(|source| PlanError::Signing {
                    user_name: identity.user_name.clone(),
                    source,
                })?;
            bundle.auth = Some(auth);
            bundle.user_name = Some(identity.user_name.clone());
        }

        bundle.channels.push(BundleChannel {
            name: channel.name,
            pairs: channel.pairs.clone(),
        });
    }

    Ok(bundles)
}

// =============================================================================
// Tests
// =============================================================================
