//! Configuration Module
//!
//! Environment-variable configuration loading for the subscriber.

mod settings;

pub use settings::{DEFAULT_FEED_URL, DEFAULT_METRICS_PORT, FeedSettings, SettingsError};
