//! GDAX Stream Subscriber Binary
//!
//! Validates the configured subscriptions, opens one connection per
//! planned bundle and streams until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin gdax-stream-subscriber
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `GDAX_CHANNELS`: JSON array of channel objects
//!   (`name`, `product_ids`, and for `user`: `user_name`, `key`, `secret`, `passphrase`)
//!
//! ## Optional
//! - `GDAX_FEED_URL`: Websocket endpoint (default: `wss://ws-feed.gdax.com`)
//! - `GDAX_PAIRS`: Comma-separated pairs applied to every channel
//! - `GDAX_HANDSHAKE_TIMEOUT_SECS`: Bound per startup step, 0 = none (default: 10)
//! - `GDAX_METRICS_PORT`: Prometheus metrics port, 0 = disabled (default: 9090)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: gdax-stream-subscriber)
//! - `RUST_LOG`: Log filter (default: `gdax_stream_subscriber=info`)

use std::sync::Arc;
use std::time::Duration;

use gdax_stream_subscriber::infrastructure::telemetry;
use gdax_stream_subscriber::{
    ConnectionSupervisor, FeedSettings, MetricsSink, Signer, SystemClock, WsDialer, init_metrics,
    plan,
};
use tokio::signal;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err("failed to install rustls crypto provider".into());
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting GDAX Stream Subscriber");

    let settings = FeedSettings::from_env()?;
    log_settings(&settings);

    if settings.metrics_port != 0 {
        let addr = init_metrics(settings.metrics_port)?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    let config = settings.validate()?;
    let bundles = plan(&config, &Signer::new(SystemClock))?;
    tracing::info!(
        channels = config.channels.len(),
        users = config.identity_count(),
        connections = bundles.len(),
        "Subscriptions planned"
    );

    let supervisor = ConnectionSupervisor::new(
        Arc::new(WsDialer::new()),
        config.feed_url.clone(),
        Arc::new(MetricsSink::new()),
    )
    .with_settings(settings.supervisor_settings());

    supervisor.start(&bundles).await?;

    tracing::info!(connections = supervisor.connection_count(), "Subscriber ready");

    await_shutdown().await;

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, supervisor.stop())
        .await
        .is_err()
    {
        tracing::warn!("Read loops did not exit before the shutdown timeout");
    }

    tracing::info!("Subscriber stopped");
    Ok(())
}

/// Log the parsed settings.
fn log_settings(settings: &FeedSettings) {
    tracing::info!(
        feed_url = %settings.feed_url,
        pairs = ?settings.pairs,
        channels = settings.channels.len(),
        handshake_timeout = ?settings.handshake_timeout,
        metrics_port = settings.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
