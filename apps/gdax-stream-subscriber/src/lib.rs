#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! GDAX Stream Subscriber - Multi-Connection Feed Client
//!
//! Validates a declarative set of GDAX websocket channel subscriptions,
//! packs them onto as few connections as the one-user-per-connection rule
//! allows, signs the authenticated ones, and supervises one read loop per
//! connection until shutdown.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and algorithms, no I/O
//!   - `subscription`: Channel names, declared settings, normalized subscriptions
//!   - `validation`: Configuration rules and normalization
//!   - `signing`: HMAC request signing for authenticated channels
//!   - `planning`: Packing channels into connection bundles
//!   - `handshake`: Acknowledgement matching
//!   - `streaming`: Decoded feed messages
//!
//! - **Application**: Port definitions
//!   - `ports`: Transport and message sink interfaces
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `gdax`: Wire types, codec, websocket transport, connection supervisor
//!   - `config`: Environment configuration
//!   - `metrics`: Prometheus metrics and message sinks
//!   - `telemetry`: Tracing subscriber and OpenTelemetry export
//!
//! # Data Flow
//!
//! ```text
//! FeedSettings ──► validate ──► plan ──► ConnectionSupervisor::start
//!                                              │
//!                     ┌────────────────────────┼────────────────────────┐
//!                     ▼                        ▼                        ▼
//!               connection 0             connection 1             connection N
//!               (read loop)              (read loop)              (read loop)
//!                     └────────────────────────┼────────────────────────┘
//!                                              ▼
//!                                         MessageSink
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Subscription model and algorithms with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::handshake::{Acknowledgement, HandshakeError, PairMismatch, validate_ack};
pub use domain::planning::{BundleChannel, PlanError, SubscriptionBundle, plan};
pub use domain::signing::{AuthBlock, Clock, FixedClock, Signer, SignerError, SystemClock};
pub use domain::streaming::FeedMessage;
pub use domain::subscription::{
    ChannelName, ChannelSettings, ChannelSubscription, Pair, UserIdentity,
};
pub use domain::validation::{ConfigError, NormalizedConfig, validate};

// Ports
pub use application::ports::{
    FeedConnection, FeedDialer, MessageOrigin, MessageSink, TransportError,
};

// GDAX adapters
pub use infrastructure::gdax::{
    ConnectionSupervisor, StartupError, SupervisorSettings, WsConnection, WsDialer,
};

// Infrastructure config
pub use infrastructure::config::{FeedSettings, SettingsError};

// Metrics
pub use infrastructure::metrics::{ChannelSink, MetricsSink, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
