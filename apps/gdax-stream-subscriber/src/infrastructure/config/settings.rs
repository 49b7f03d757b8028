//! Subscriber Configuration Settings
//!
//! Configuration types for the feed subscriber, loaded from environment
//! variables. Loading only parses; the subscription rules are checked by
//! [`FeedSettings::validate`].

use std::time::Duration;

use crate::domain::subscription::ChannelSettings;
use crate::domain::validation::{self, ConfigError, NormalizedConfig};
use crate::infrastructure::gdax::{DEFAULT_HANDSHAKE_TIMEOUT, SupervisorSettings};

/// Default feed endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://ws-feed.gdax.com";

/// Default Prometheus exporter port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Complete subscriber configuration.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Websocket endpoint.
    pub feed_url: String,
    /// Pairs applied to every channel.
    pub pairs: Vec<String>,
    /// Declared channel subscriptions.
    pub channels: Vec<ChannelSettings>,
    /// Bound on each startup step (`None` = unbounded).
    pub handshake_timeout: Option<Duration>,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl FeedSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `GDAX_CHANNELS` is missing, empty or not a JSON
    /// array of channel objects.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`FeedSettings::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let raw_channels = lookup("GDAX_CHANNELS")
            .ok_or_else(|| SettingsError::MissingEnvVar("GDAX_CHANNELS".to_string()))?;

        if raw_channels.trim().is_empty() {
            return Err(SettingsError::EmptyValue("GDAX_CHANNELS".to_string()));
        }

        let channels: Vec<ChannelSettings> =
            serde_json::from_str(&raw_channels).map_err(SettingsError::InvalidChannels)?;

        let feed_url = lookup("GDAX_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string());

        let pairs = lookup("GDAX_PAIRS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let timeout_secs = parse_u64(
            lookup("GDAX_HANDSHAKE_TIMEOUT_SECS"),
            DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
        );
        let handshake_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let metrics_port = parse_u16(lookup("GDAX_METRICS_PORT"), DEFAULT_METRICS_PORT);

        Ok(Self {
            feed_url,
            pairs,
            channels,
            handshake_timeout,
            metrics_port,
        })
    }

    /// Check the subscription rules and normalize the declared channels.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<NormalizedConfig, ConfigError> {
        validation::validate(&self.feed_url, &self.pairs, &self.channels)
    }

    /// Supervisor settings derived from this configuration.
    #[must_use]
    pub const fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            handshake_timeout: self.handshake_timeout,
        }
    }
}

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// `GDAX_CHANNELS` is not a JSON array of channel objects.
    #[error("GDAX_CHANNELS is not valid channel JSON: {0}")]
    InvalidChannels(#[source] serde_json::Error),
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u16(value: Option<String>, default: u16) -> u16 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_u64(value: Option<String>, default: u64) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
