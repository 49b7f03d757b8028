//! Subscription Types
//!
//! Domain types for the channels a feed client can subscribe to, the
//! per-user identities attached to authenticated channels, and the pair
//! normalization rules shared by validation and planning.
//!
//! # Design
//!
//! Channels come in two flavours:
//! - Public channels (`ticker`, `level2`): at most one of each, never
//!   carry credentials, and can share any connection.
//! - Authenticated channels (`user`): one per identity, each identity
//!   needs its own connection.

use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;

// =============================================================================
// Types
// =============================================================================

/// An instrument symbol such as `ETH-USD`.
pub type Pair = String;

/// Channel names understood by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Best bid/ask and last trade updates.
    Ticker,
    /// Order book snapshots and deltas.
    Level2,
    /// Authenticated account events for a single user.
    User,
}

impl ChannelName {
    /// All channel names, in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Ticker, Self::Level2, Self::User]
    }

    /// Parse a channel name exactly as it appears on the wire.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ticker" => Some(Self::Ticker),
            "level2" => Some(Self::Level2),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    /// Wire name of the channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Level2 => "level2",
            Self::User => "user",
        }
    }

    /// Whether subscribing requires an authenticated identity.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Declarative Channel Settings
// =============================================================================

/// One channel block as supplied by the user, before validation.
///
/// All fields are optional on input; validation decides which ones are
/// required for the named channel.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Channel name (`ticker`, `level2` or `user`).
    pub name: String,
    /// Channel specific pairs, in addition to the global pairs.
    #[serde(alias = "product_ids")]
    pub pairs: Vec<String>,
    /// Display name of the user, required for `user` channels.
    pub user_name: String,
    /// API key (base64), required for `user` channels.
    pub key: String,
    /// API secret (base64), required for `user` channels.
    pub secret: String,
    /// API passphrase, required for `user` channels.
    pub passphrase: String,
}

impl ChannelSettings {
    /// Create a public channel block.
    #[must_use]
    pub fn public(name: impl Into<String>, pairs: &[&str]) -> Self {
        Self {
            name: name.into(),
            pairs: pairs.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Create a `user` channel block.
    #[must_use]
    pub fn user(
        user_name: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
        passphrase: impl Into<String>,
        pairs: &[&str],
    ) -> Self {
        Self {
            name: ChannelName::User.as_str().to_string(),
            pairs: pairs.iter().map(ToString::to_string).collect(),
            user_name: user_name.into(),
            key: key.into(),
            secret: secret.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Whether a user name is set.
    #[must_use]
    pub fn has_user_name(&self) -> bool {
        !self.user_name.is_empty()
    }

    /// Whether any API credential field is set.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.key.is_empty() || !self.secret.is_empty() || !self.passphrase.is_empty()
    }
}

impl fmt::Debug for ChannelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSettings")
            .field("name", &self.name)
            .field("pairs", &self.pairs)
            .field("user_name", &self.user_name)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Validated Types
// =============================================================================

/// Credentials of one authenticated user.
///
/// The `Debug` implementation redacts the secret and passphrase.
#[derive(Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Display name, used as the `user` label on metrics.
    pub user_name: String,
    /// API key (base64).
    pub key: String,
    /// API secret (base64).
    pub secret: String,
    /// API passphrase.
    pub passphrase: String,
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("user_name", &self.user_name)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// A validated channel subscription.
///
/// `pairs` holds the effective pairs only: pairs already covered by the
/// global pair list are removed during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSubscription {
    /// Channel name.
    pub name: ChannelName,
    /// Effective channel pairs (normalized, deduplicated, minus globals).
    pub pairs: Vec<Pair>,
    /// Identity for `user` channels, `None` otherwise.
    pub identity: Option<UserIdentity>,
}

impl ChannelSubscription {
    /// User name of the identity, if any.
    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|id| id.user_name.as_str())
    }
}

// =============================================================================
// Pair Normalization
// =============================================================================

/// Upper-case each pair and drop duplicates, keeping first-seen order.
///
/// Pairs found in `exclude` are dropped as well.
#[must_use]
pub fn normalize_pairs<S: AsRef<str>>(pairs: &[S], exclude: &[Pair]) -> Vec<Pair> {
    let mut seen: HashSet<Pair> = exclude.iter().cloned().collect();
    let mut normalized = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let pair = pair.as_ref().to_uppercase();
        if seen.insert(pair.clone()) {
            normalized.push(pair);
        }
    }

    normalized
}

// =============================================================================
// Tests
// =============================================================================
