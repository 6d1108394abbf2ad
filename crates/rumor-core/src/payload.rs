//! Payload sources
//!
//! The payload travels next to the sequence counter and is refreshed every
//! time the owning node advances. Its contents are never interpreted.

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Produces the opaque payload attached to each local advance.
pub trait PayloadSource: Send + Sync {
    fn next_payload(&self) -> Value;
}

/// Wall-clock source: Unix time in milliseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl PayloadSource for SystemClock {
    fn next_payload(&self) -> Value {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let millis = u64::try_from(millis).unwrap_or(u64::MAX);
        Value::from(millis)
    }
}

impl<F> PayloadSource for F
where
    F: Fn() -> Value + Send + Sync,
{
    fn next_payload(&self) -> Value {
        self()
    }
}
