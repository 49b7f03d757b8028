//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// GDAX websocket adapters and the connection supervisor.
pub mod gdax;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation and message sinks.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
