//! rumord - push/pull gossip daemon
//!
//! This daemon provides:
//! - A lock-guarded local node record with a depth-bounded peer registry
//! - Periodic broadcast of the local record to every known peer
//! - An HTTP endpoint that merges pushed records and answers stale senders
//! - One-shot bootstrap introductions to configured addresses

pub mod config;
pub mod exchange;
pub mod node;
pub mod server;

pub use config::Config;
pub use exchange::{Exchange, ExchangeError, ExchangeStats, PushResponse};
pub use node::LocalNode;
pub use server::Server;
