//! Prometheus Metrics Module
//!
//! Exposes subscriber metrics via Prometheus format for monitoring, and
//! provides the [`MessageSink`](crate::application::ports::MessageSink)
//! implementations the read loops hand decoded messages to.
//!
//! # Metrics Categories
//!
//! - **Messages**: Counts of messages received by channel and user
//! - **Connections**: Open feed connections
//! - **Errors**: Handshake failures by step, read loop failures
//!
//! # Integration
//!
//! Metrics are served at `/metrics` on the configured port when the
//! exporter is enabled. Without an installed recorder every helper here
//! is a no-op.

mod sink;

pub use sink::{ChannelSink, MetricsSink};

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Exporter
// =============================================================================

static EXPORTER_ADDR: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Idempotent: later calls return the address bound by the first one.
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed or the listener
/// cannot be bound.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = EXPORTER_ADDR.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(*EXPORTER_ADDR.get_or_init(|| addr))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "gdax_subscriber_messages_received_total",
        "Total feed messages received by channel and user"
    );

    describe_gauge!(
        "gdax_subscriber_connections",
        "Number of open feed connections"
    );

    describe_counter!(
        "gdax_subscriber_handshake_failures_total",
        "Total connection startup failures by step"
    );
    describe_counter!(
        "gdax_subscriber_read_errors_total",
        "Total read loops terminated by a receive or decode error"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Label used when a message cannot be attributed to a channel.
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// Record a message received on a connection.
pub fn record_message_received(channel: &'static str, user: Option<&str>) {
    counter!(
        "gdax_subscriber_messages_received_total",
        "channel" => channel,
        "user" => user.unwrap_or_default().to_string()
    )
    .increment(1);
}

/// Record a connection that completed its handshake.
pub fn record_connection_opened() {
    gauge!("gdax_subscriber_connections").increment(1.0);
}

/// Record a connection that was closed.
pub fn record_connection_closed() {
    gauge!("gdax_subscriber_connections").decrement(1.0);
}

/// Record a startup failure at `step`.
pub fn record_handshake_failure(step: &'static str) {
    counter!(
        "gdax_subscriber_handshake_failures_total",
        "step" => step
    )
    .increment(1);
}

/// Record a read loop that ended on an error.
pub fn record_read_error(bundle: usize) {
    counter!(
        "gdax_subscriber_read_errors_total",
        "bundle" => bundle.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
