//! Domain Layer - Subscription model and planning logic.
//!
//! Everything here is pure: no sockets, no tasks, no global state. The
//! only time source is the injectable [`signing::Clock`].

/// Channel, identity and pair types.
pub mod subscription;

/// Configuration validation and normalization.
pub mod validation;

/// Request signing for authenticated channels.
pub mod signing;

/// Packing channels into per-connection subscribe requests.
pub mod planning;

/// Acknowledgement checks for the subscribe handshake.
pub mod handshake;

/// Data messages streamed after subscribing.
pub mod streaming;
