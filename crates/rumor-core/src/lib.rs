//! rumor Core Library
//!
//! This crate provides the node record types, the last-writer-wins
//! reconciliation rule, and the JSON wire codec for the rumor gossip
//! protocol.
//!
//! # Modules
//!
//! - [`record`]: NodeId, NodeRecord and the depth-bounded peer registry
//! - [`merge`]: Reconciliation of an incoming snapshot into local state
//! - [`codec`]: JSON encoding of records for the wire
//! - [`payload`]: Sources for the opaque payload refreshed on each advance
//! - [`error`]: Error types

pub mod codec;
pub mod error;
pub mod merge;
pub mod payload;
pub mod record;

pub use codec::{decode_record, encode_record, MEDIA_TYPE};
pub use error::{Error, Result};
pub use merge::MergeOutcome;
pub use payload::{PayloadSource, SystemClock};
pub use record::{NodeId, NodeRecord};
