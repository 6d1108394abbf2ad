//! Node identity and the depth-bounded peer registry
//!
//! A node's own record is the root of its local view. Records stored inside
//! `peers` never carry peers of their own, so a snapshot's size grows with the
//! cluster, not with the gossip history.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque, globally unique node identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The unit of gossip: one node's identity, counter, payload and known peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Immutable identifier
    pub id: NodeId,
    /// Monotonic counter, only ever incremented by the owning node
    pub sequence: u64,
    /// Opaque value updated together with `sequence`
    #[serde(default)]
    pub payload: Value,
    /// Endpoint peers push to, e.g. `http://10.0.0.1:9100`
    pub address: String,
    /// Known peers; nested records always have empty `peers`
    #[serde(default)]
    pub peers: HashMap<NodeId, NodeRecord>,
}

impl NodeRecord {
    /// Create a fresh record with counter zero and an empty registry
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: 0,
            payload: Value::Null,
            address: address.into(),
            peers: HashMap::new(),
        }
    }

    /// Advance our own counter and replace the payload in one step
    pub fn advance(&mut self, payload: Value) {
        self.sequence = self.sequence.saturating_add(1);
        self.payload = payload;
    }

    /// Seed the registry with a known peer.
    ///
    /// Returns `false` when the record is ourselves or would lower the stored
    /// sequence for that peer.
    pub fn add_peer(&mut self, peer: NodeRecord) -> bool {
        if peer.id == self.id {
            return false;
        }
        if let Some(existing) = self.peers.get(&peer.id) {
            if existing.sequence > peer.sequence {
                return false;
            }
        }
        let peer = peer.into_summary();
        self.peers.insert(peer.id.clone(), peer);
        true
    }

    pub fn peer(&self, id: &NodeId) -> Option<&NodeRecord> {
        self.peers.get(id)
    }

    pub fn peers(&self) -> impl Iterator<Item = &NodeRecord> {
        self.peers.values()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Push targets for a broadcast round
    pub fn peer_addresses(&self) -> Vec<String> {
        self.peers().map(|p| p.address.clone()).collect()
    }

    /// Strip nested peers, consuming the record
    pub fn into_summary(mut self) -> NodeRecord {
        self.peers.clear();
        self
    }

    /// True when every record under `peers` has no peers of its own
    pub fn is_depth_bounded(&self) -> bool {
        self.peers().all(|p| p.peers.is_empty())
    }
}
