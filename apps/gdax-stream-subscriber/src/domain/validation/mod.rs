//! Configuration Validation
//!
//! Turns the declarative feed settings (feed URL, global pairs, channel
//! blocks) into a [`NormalizedConfig`] or a descriptive [`ConfigError`].
//!
//! # Rules
//!
//! 1. The feed URL must be set.
//! 2. At least one channel must be declared.
//! 3. Global pairs are upper-cased and deduplicated (first-seen order).
//! 4. Channel pairs are normalized the same way and reduced to the pairs
//!    not already covered globally. A channel must end up with at least
//!    one pair, counting the global ones.
//! 5. At most one `ticker` and one `level2` channel, neither of which may
//!    carry a user name or credentials.
//! 6. `user` channels need a user name, a base64 key, a base64 secret and
//!    a passphrase. User names and keys are unique across the config.
//! 7. Unknown channel names are rejected.
//!
//! Validation never corrects input: every defect is an error.

use std::collections::{HashMap, HashSet};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use super::subscription::{
    ChannelName, ChannelSettings, ChannelSubscription, Pair, UserIdentity, normalize_pairs,
};

// =============================================================================
// Error Types
// =============================================================================

/// A violated configuration rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Feed URL is empty.
    #[error("not specified: feed_url")]
    MissingFeedUrl,

    /// Channel list is empty.
    #[error("no channels specified")]
    NoChannels,

    /// A channel block has no name.
    #[error("not specified: channel")]
    MissingChannelName,

    /// Channel name is not one of `ticker`, `level2`, `user`.
    #[error("invalid channel: '{0}'")]
    UnknownChannel(String),

    /// Neither the channel nor the global list provides a pair.
    #[error("no pairs specified for '{0}' channel")]
    NoPairs(ChannelName),

    /// A public channel was declared more than once.
    #[error("channel '{0}' declared twice")]
    DuplicateChannel(ChannelName),

    /// A public channel carries a user name.
    #[error("cannot specify user_name for '{0}' channel")]
    UserNameOnPublicChannel(ChannelName),

    /// A public channel carries API credentials.
    #[error("cannot specify API credentials for '{0}' channel")]
    CredentialsOnPublicChannel(ChannelName),

    /// A `user` channel has no user name.
    #[error("no user_name for 'user' channel")]
    MissingUserName,

    /// A `user` channel has no key.
    #[error("no key specified for user '{0}'")]
    MissingKey(String),

    /// The key is not valid base64.
    #[error("non-base64 key for user '{0}'")]
    NonBase64Key(String),

    /// A `user` channel has no secret.
    #[error("no secret specified for user '{0}'")]
    MissingSecret(String),

    /// The secret is not valid base64.
    #[error("non-base64 secret for user '{0}'")]
    NonBase64Secret(String),

    /// A `user` channel has no passphrase.
    #[error("no passphrase specified for user '{0}'")]
    MissingPassphrase(String),

    /// Two `user` channels share a user name.
    #[error("duplicate user_name '{0}': user_name should be unique")]
    DuplicateUserName(String),

    /// Two `user` channels share a key.
    #[error("duplicate key for user '{0}': key should be unique")]
    DuplicateKey(String),
}

// =============================================================================
// Normalized Configuration
// =============================================================================

/// Validated, canonical feed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedConfig {
    /// Websocket feed URL.
    pub feed_url: String,
    /// Global pairs, applied to every channel.
    pub global_pairs: Vec<Pair>,
    /// Channels in declaration order, with effective pairs.
    pub channels: Vec<ChannelSubscription>,
    /// User name of each authenticated identity, keyed by API key.
    pub user_names_by_key: HashMap<String, String>,
}

impl NormalizedConfig {
    /// Number of distinct authenticated identities.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.user_names_by_key.len()
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validate and normalize a feed configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError`] encountered, in rule order.
pub fn validate(
    feed_url: &str,
    global_pairs: &[String],
    channels: &[ChannelSettings],
) -> Result<NormalizedConfig, ConfigError> {
    if feed_url.is_empty() {
        return Err(ConfigError::MissingFeedUrl);
    }
    if channels.is_empty() {
        return Err(ConfigError::NoChannels);
    }

    let global_pairs = normalize_pairs(global_pairs, &[]);

    let mut seen_public = HashSet::new();
    let mut user_names = HashSet::new();
    let mut user_names_by_key = HashMap::new();
    let mut validated = Vec::with_capacity(channels.len());

    for settings in channels {
        if settings.name.is_empty() {
            return Err(ConfigError::MissingChannelName);
        }
        let name = ChannelName::parse(&settings.name)
            .ok_or_else(|| ConfigError::UnknownChannel(settings.name.clone()))?;

        let pairs = normalize_pairs(&settings.pairs, &global_pairs);
        if pairs.is_empty() && global_pairs.is_empty() {
            return Err(ConfigError::NoPairs(name));
        }

        let identity = if name.is_authenticated() {
            let identity = validate_identity(settings)?;
            if !user_names.insert(identity.user_name.clone()) {
                return Err(ConfigError::DuplicateUserName(identity.user_name));
            }
            if user_names_by_key.contains_key(&identity.key) {
                return Err(ConfigError::DuplicateKey(identity.user_name));
            }
            user_names_by_key.insert(identity.key.clone(), identity.user_name.clone());
            Some(identity)
        } else {
            if !seen_public.insert(name) {
                return Err(ConfigError::DuplicateChannel(name));
            }
            if settings.has_user_name() {
                return Err(ConfigError::UserNameOnPublicChannel(name));
            }
            if settings.has_credentials() {
                return Err(ConfigError::CredentialsOnPublicChannel(name));
            }
            None
        };

        validated.push(ChannelSubscription {
            name,
            pairs,
            identity,
        });
    }

    Ok(NormalizedConfig {
        feed_url: feed_url.to_string(),
        global_pairs,
        channels: validated,
        user_names_by_key,
    })
}

/// Check the credential fields of a `user` channel block.
fn validate_identity(settings: &ChannelSettings) -> Result<UserIdentity, ConfigError> {
    let user_name = &settings.user_name;
    if user_name.is_empty() {
        return Err(ConfigError::MissingUserName);
    }
    if settings.key.is_empty() {
        return Err(ConfigError::MissingKey(user_name.clone()));
    }
    if STANDARD.decode(&settings.key).is_err() {
        return Err(ConfigError::NonBase64Key(user_name.clone()));
    }
    if settings.secret.is_empty() {
        return Err(ConfigError::MissingSecret(user_name.clone()));
    }
    if STANDARD.decode(&settings.secret).is_err() {
        return Err(ConfigError::NonBase64Secret(user_name.clone()));
    }
    if settings.passphrase.is_empty() {
        return Err(ConfigError::MissingPassphrase(user_name.clone()));
    }

    Ok(UserIdentity {
        user_name: user_name.clone(),
        key: settings.key.clone(),
        secret: settings.secret.clone(),
        passphrase: settings.passphrase.clone(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    const FEED_URL: &str = "wss://ws-feed.gdax.com";

    fn ticker() -> ChannelSettings {
        ChannelSettings::public("ticker", &["ETH-USD"])
    }

    fn level2() -> ChannelSettings {
        ChannelSettings::public("level2", &["BTC-USD", "ETH-USD"])
    }

    fn john() -> ChannelSettings {
        ChannelSettings::user(
            "John Smith",
            "a531631f192bf4778a19fbfbfae237a5",
            "a4446242132b34778a19fbfbfae237a5",
            "passphrase",
            &["BTC-USD", "ETH-USD"],
        )
    }

    fn jane() -> ChannelSettings {
        ChannelSettings::user(
            "Jane Smith",
            "b323431f192bf4778a19fbfbfbb237b5",
            "a532631f1923f4778a194bfbfae337a5",
            "passphrase",
            &["BTC-USD", "ETH-USD"],
        )
    }

    fn all_channels() -> Vec<ChannelSettings> {
        vec![ticker(), level2(), john(), jane()]
    }

    #[test]
    fn valid_config_accepted() {
        let config = validate(FEED_URL, &[], &all_channels()).unwrap();
        assert_eq!(config.feed_url, FEED_URL);
        assert_eq!(config.channels.len(), 4);
        assert_eq!(config.identity_count(), 2);
        assert_eq!(
            config.user_names_by_key["a531631f192bf4778a19fbfbfae237a5"],
            "John Smith"
        );
    }

    #[test]
    fn empty_feed_url_rejected() {
        let err = validate("", &[], &all_channels()).unwrap_err();
        assert_eq!(err, ConfigError::MissingFeedUrl);
    }

    #[test]
    fn empty_channels_rejected() {
        let err = validate(FEED_URL, &[], &[]).unwrap_err();
        assert_eq!(err, ConfigError::NoChannels);
    }

    #[test]
    fn empty_channel_name_rejected() {
        let mut channels = all_channels();
        channels[0].name.clear();
        let err = validate(FEED_URL, &[], &channels).unwrap_err();
        assert_eq!(err, ConfigError::MissingChannelName);
    }

    #[test]
    fn unknown_channel_rejected() {
        let mut channels = all_channels();
        channels[0].name = "invalid".to_string();
        let err = validate(FEED_URL, &[], &channels).unwrap_err();
        assert_eq!(err, ConfigError::UnknownChannel("invalid".to_string()));
    }

    #[test]
    fn channel_without_any_pairs_rejected() {
        let mut channels = all_channels();
        channels[0].pairs.clear();
        let err = validate(FEED_URL, &[], &channels).unwrap_err();
        assert_eq!(err, ConfigError::NoPairs(ChannelName::Ticker));
    }

    #[test]
    fn global_pairs_normalized_and_channel_pairs_reduced() {
        let mut channels = all_channels();
        channels[0].pairs.clear();
        channels[1].pairs = ["btc-usd", "btc-usd", "BTC-ETH", "ETH-USD"]
            .map(String::from)
            .to_vec();
        let global = ["eth-usd", "BTC-ETH", "ETH-USD"].map(String::from);

        let config = validate(FEED_URL, &global, &channels).unwrap();

        assert_eq!(config.global_pairs, vec!["ETH-USD", "BTC-ETH"]);
        assert!(config.channels[0].pairs.is_empty());
        assert_eq!(config.channels[1].pairs, vec!["BTC-USD"]);
    }

    #[test]
    fn channel_covered_by_globals_is_valid() {
        let global = ["ETH-USD".to_string()];
        let config = validate(FEED_URL, &global, &[ticker()]).unwrap();
        assert!(config.channels[0].pairs.is_empty());
    }

    #[test_case("ticker" ; "ticker")]
    #[test_case("level2" ; "level2")]
    fn single_public_channel_accepted(name: &str) {
        let config =
            validate(FEED_URL, &[], &[ChannelSettings::public(name, &["ETH-USD"])]).unwrap();
        assert_eq!(config.identity_count(), 0);
        assert!(config.channels[0].identity.is_none());
    }

    #[test_case("ticker", ChannelName::Ticker ; "ticker")]
    #[test_case("level2", ChannelName::Level2 ; "level2")]
    fn duplicate_public_channel_rejected(name: &str, channel: ChannelName) {
        let block = ChannelSettings::public(name, &["ETH-USD"]);
        let err = validate(FEED_URL, &[], &[block.clone(), block]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateChannel(channel));
    }

    #[test_case("ticker", "user_name" ; "ticker user_name")]
    #[test_case("ticker", "key" ; "ticker key")]
    #[test_case("ticker", "secret" ; "ticker secret")]
    #[test_case("ticker", "passphrase" ; "ticker passphrase")]
    #[test_case("level2", "user_name" ; "level2 user_name")]
    #[test_case("level2", "key" ; "level2 key")]
    #[test_case("level2", "secret" ; "level2 secret")]
    #[test_case("level2", "passphrase" ; "level2 passphrase")]
    fn identity_on_public_channel_rejected(name: &str, field: &str) {
        let mut block = ChannelSettings::public(name, &["ETH-USD"]);
        match field {
            "user_name" => block.user_name = "John Smith".into(),
            "key" => block.key = "api key".into(),
            "secret" => block.secret = "api secret".into(),
            _ => block.passphrase = "api passphrase".into(),
        }
        let err = validate(FEED_URL, &[], &[block]).unwrap_err();
        let channel = ChannelName::parse(name).unwrap();
        if field == "user_name" {
            assert_eq!(err, ConfigError::UserNameOnPublicChannel(channel));
        } else {
            assert_eq!(err, ConfigError::CredentialsOnPublicChannel(channel));
        }
    }

    #[test]
    fn user_without_user_name_rejected() {
        let mut block = john();
        block.user_name.clear();
        let err = validate(FEED_URL, &[], &[block]).unwrap_err();
        assert_eq!(err, ConfigError::MissingUserName);
    }

    #[test]
    fn user_key_rules() {
        let mut block = john();
        block.key.clear();
        let err = validate(FEED_URL, &[], std::slice::from_ref(&block)).unwrap_err();
        assert_eq!(err, ConfigError::MissingKey("John Smith".into()));

        block.key = "not valid base64 !@#$".into();
        let err = validate(FEED_URL, &[], &[block]).unwrap_err();
        assert_eq!(err, ConfigError::NonBase64Key("John Smith".into()));
    }

    #[test]
    fn user_secret_rules() {
        let mut block = john();
        block.secret.clear();
        let err = validate(FEED_URL, &[], std::slice::from_ref(&block)).unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret("John Smith".into()));

        block.secret = "not valid base64 !@#$".into();
        let err = validate(FEED_URL, &[], &[block]).unwrap_err();
        assert_eq!(err, ConfigError::NonBase64Secret("John Smith".into()));
    }

    #[test]
    fn user_without_passphrase_rejected() {
        let mut block = john();
        block.passphrase.clear();
        let err = validate(FEED_URL, &[], &[block]).unwrap_err();
        assert_eq!(err, ConfigError::MissingPassphrase("John Smith".into()));
    }

    #[test]
    fn single_user_accepted() {
        let config = validate(FEED_URL, &[], &[john()]).unwrap();
        assert_eq!(config.identity_count(), 1);
        assert_eq!(config.channels[0].user_name(), Some("John Smith"));
    }

    #[test]
    fn duplicate_user_name_rejected() {
        let mut second = jane();
        second.user_name = "John Smith".into();
        let err = validate(FEED_URL, &[], &[john(), second]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateUserName("John Smith".into()));
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut second = jane();
        second.key = john().key;
        let err = validate(FEED_URL, &[], &[john(), second]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateKey("Jane Smith".into()));
    }

    #[test]
    fn distinct_users_accepted() {
        let config = validate(FEED_URL, &[], &[john(), jane()]).unwrap();
        assert_eq!(config.identity_count(), 2);
    }

    #[test]
    fn error_messages_name_the_rule() {
        assert_eq!(
            ConfigError::NonBase64Secret("John".into()).to_string(),
            "non-base64 secret for user 'John'"
        );
        assert_eq!(
            ConfigError::DuplicateChannel(ChannelName::Level2).to_string(),
            "channel 'level2' declared twice"
        );
    }

    proptest! {
        #[test]
        fn global_pairs_are_unique_and_uppercase(
            pairs in proptest::collection::vec("[a-zA-Z]{3}-[a-zA-Z]{3}", 1..12)
        ) {
            let config = validate(FEED_URL, &pairs, &[ticker()]).unwrap();
            let unique: HashSet<_> = config.global_pairs.iter().collect();
            prop_assert_eq!(unique.len(), config.global_pairs.len());
            for pair in &config.global_pairs {
                prop_assert_eq!(pair, &pair.to_uppercase());
            }
            for pair in &config.channels[0].pairs {
                prop_assert!(!config.global_pairs.contains(pair));
            }
        }
    }
}
