//! Networking primitives for the rumor gossip protocol
//!
//! This crate provides:
//! - The HTTP client used to push snapshots to peers
//! - Mapping between push outcomes and HTTP status codes

pub mod transport;

pub use transport::{HttpTransport, PushReply, PushStatus, TransportError};
