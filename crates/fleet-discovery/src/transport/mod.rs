//! Transport layer modules.
//!
//! ## Available Transports
//!
//! - `quic` - QUIC with TLS 1.3; the server certificate is the one pinned
//!   by peers
//!
//! ## Feature Gates
//!
//! - `quic` feature: enables this module (quinn, rustls, rcgen)
//!
//! Without the feature, [`crate::adapters::LocalNetwork`] is the only
//! transport.

pub mod quic;

pub use quic::{NodeTlsMaterial, QuicConfig, QuicFleetServer, QuicPeerTransport};
