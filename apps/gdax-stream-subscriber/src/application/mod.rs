//! Application Layer - Port definitions.
//!
//! The traits the connection supervisor is written against, so it can
//! run over a real websocket or an in-memory fake.

/// Port interfaces for external systems (transport, message sink).
pub mod ports;
