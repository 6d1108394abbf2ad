//! Push/pull gossip exchange
//!
//! Outbound, a broadcast round advances our counter once, pushes the same
//! snapshot to every known peer, and merges whatever newer state a peer sends
//! back. Inbound, a push is merged and answered with our record when the
//! sender turned out to be behind.

use crate::node::LocalNode;
use rand::seq::SliceRandom;
use rumor_core::decode_record;
use rumor_net::{HttpTransport, PushStatus, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Exchange errors
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Malformed push: {0}")]
    Malformed(#[source] rumor_core::Error),
    #[error("Encode failed: {0}")]
    Encode(#[source] rumor_core::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Malformed reply from {address}: {source}")]
    Pull {
        address: String,
        #[source]
        source: rumor_core::Error,
    },
}

/// Answer to an inbound push
#[derive(Debug)]
pub struct PushResponse {
    pub status: PushStatus,
    /// Our record, when the sender is behind us
    pub body: Option<Vec<u8>>,
}

#[derive(Default)]
struct Counters {
    rounds_completed: AtomicU64,
    rounds_failed: AtomicU64,
    pushes_sent: AtomicU64,
    pulls_applied: AtomicU64,
    pushes_received: AtomicU64,
    malformed_pushes: AtomicU64,
}

/// Gossip exchange driver
pub struct Exchange {
    node: Arc<LocalNode>,
    transport: HttpTransport,
    counters: Counters,
}

impl Exchange {
    pub fn new(node: Arc<LocalNode>, transport: HttpTransport) -> Self {
        Self {
            node,
            transport,
            counters: Counters::default(),
        }
    }

    pub fn node(&self) -> &Arc<LocalNode> {
        &self.node
    }

    /// Run one broadcast round.
    ///
    /// The first failed push ends the round; remaining peers wait for the next
    /// one.
    pub async fn broadcast(&self) -> Result<(), ExchangeError> {
        let result = self.broadcast_round().await;
        match &result {
            Ok(()) => self.counters.rounds_completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.counters.rounds_failed.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    async fn broadcast_round(&self) -> Result<(), ExchangeError> {
        let mut outbound = self
            .node
            .advance_and_encode()
            .map_err(ExchangeError::Encode)?;
        outbound.targets.shuffle(&mut rand::thread_rng());

        debug!(
            sequence = outbound.sequence,
            peers = outbound.targets.len(),
            "broadcasting"
        );

        for address in &outbound.targets {
            let reply = self.transport.push(address, outbound.body.clone()).await?;
            self.counters.pushes_sent.fetch_add(1, Ordering::Relaxed);
            if reply.has_body() {
                self.pull(address, &reply.body)?;
            }
        }
        Ok(())
    }

    /// Push our current record to an address we may not know yet.
    pub async fn introduce(&self, address: &str) -> Result<PushStatus, ExchangeError> {
        let body = self.node.encode().map_err(ExchangeError::Encode)?;
        let reply = self.transport.push(address, body).await?;
        self.counters.pushes_sent.fetch_add(1, Ordering::Relaxed);
        if reply.has_body() {
            self.pull(address, &reply.body)?;
        }
        Ok(reply.status)
    }

    fn pull(&self, address: &str, body: &[u8]) -> Result<(), ExchangeError> {
        let incoming = decode_record(body).map_err(|source| ExchangeError::Pull {
            address: address.to_string(),
            source,
        })?;
        let outcome = self.node.reconcile(incoming);
        self.counters.pulls_applied.fetch_add(1, Ordering::Relaxed);
        debug!(%address, ?outcome, "pulled newer state");
        Ok(())
    }

    /// Handle a snapshot pushed to us.
    pub fn handle_push(&self, body: &[u8]) -> Result<PushResponse, ExchangeError> {
        self.counters.pushes_received.fetch_add(1, Ordering::Relaxed);
        let incoming = match decode_record(body) {
            Ok(record) => record,
            Err(e) => {
                self.counters.malformed_pushes.fetch_add(1, Ordering::Relaxed);
                warn!("Rejected malformed push: {}", e);
                return Err(ExchangeError::Malformed(e));
            }
        };

        let sender = incoming.id.clone();
        let reconciled = self
            .node
            .reconcile_and_reply(incoming)
            .map_err(ExchangeError::Encode)?;
        debug!(%sender, outcome = ?reconciled.outcome, "handled push");

        let status = if reconciled.outcome.received_newer {
            PushStatus::Updated
        } else {
            PushStatus::Unchanged
        };
        Ok(PushResponse {
            status,
            body: reconciled.reply,
        })
    }

    /// Get exchange statistics
    pub fn stats(&self) -> ExchangeStats {
        ExchangeStats {
            rounds_completed: self.counters.rounds_completed.load(Ordering::Relaxed),
            rounds_failed: self.counters.rounds_failed.load(Ordering::Relaxed),
            pushes_sent: self.counters.pushes_sent.load(Ordering::Relaxed),
            pulls_applied: self.counters.pulls_applied.load(Ordering::Relaxed),
            pushes_received: self.counters.pushes_received.load(Ordering::Relaxed),
            malformed_pushes: self.counters.malformed_pushes.load(Ordering::Relaxed),
            peer_count: self.node.peer_count(),
            sequence: self.node.sequence(),
        }
    }
}

/// Exchange statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub rounds_completed: u64,
    pub rounds_failed: u64,
    pub pushes_sent: u64,
    pub pulls_applied: u64,
    pub pushes_received: u64,
    pub malformed_pushes: u64,
    pub peer_count: usize,
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumor_core::{decode_record, encode_record, NodeId, NodeRecord, SystemClock};
    use std::time::Duration;

    fn exchange(id: &str) -> Exchange {
        let record = NodeRecord::new(id, format!("http://{}", id));
        let node = Arc::new(LocalNode::new(record, Arc::new(SystemClock)));
        Exchange::new(node, HttpTransport::new(Duration::from_secs(2)).unwrap())
    }

    #[test]
    fn test_malformed_push_leaves_state() {
        let ex = exchange("a");
        let before = ex.node().snapshot();

        let result = ex.handle_push(b"{\"id\":");
        assert!(matches!(result, Err(ExchangeError::Malformed(_))));
        assert_eq!(ex.node().snapshot(), before);
        assert_eq!(ex.stats().malformed_pushes, 1);
    }

    #[test]
    fn test_first_push_is_updated_without_body() {
        let ex = exchange("a");
        let b = NodeRecord::new("b", "http://b");

        let response = ex.handle_push(&encode_record(&b).unwrap()).unwrap();
        assert_eq!(response.status, PushStatus::Updated);
        assert!(response.body.is_none());
        assert_eq!(ex.node().peer_count(), 1);

        let again = ex.handle_push(&encode_record(&b).unwrap()).unwrap();
        assert_eq!(again.status, PushStatus::Unchanged);
        assert!(again.body.is_none());
    }

    #[test]
    fn test_stale_sender_gets_body_and_status_tracks_received() {
        let ex = exchange("a");
        let mut b = NodeRecord::new("b", "http://b");
        b.sequence = 5;
        ex.node().seed(b.clone());

        // sender is behind on itself, nothing new for us
        b.sequence = 3;
        let response = ex.handle_push(&encode_record(&b).unwrap()).unwrap();
        assert_eq!(response.status, PushStatus::Unchanged);
        let reply = decode_record(&response.body.unwrap()).unwrap();
        assert_eq!(reply.sequence, 1);
        assert_eq!(reply.peer(&NodeId::from("b")).unwrap().sequence, 5);

        // sender is behind on itself but brings a new peer
        b.add_peer(NodeRecord::new("c", "http://c"));
        let response = ex.handle_push(&encode_record(&b).unwrap()).unwrap();
        assert_eq!(response.status, PushStatus::Updated);
        assert!(response.body.is_some());
        assert_eq!(ex.node().sequence(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_with_no_peers_still_advances() {
        let ex = exchange("a");
        ex.broadcast().await.unwrap();
        ex.broadcast().await.unwrap();

        let stats = ex.stats();
        assert_eq!(stats.sequence, 2);
        assert_eq!(stats.rounds_completed, 2);
        assert_eq!(stats.pushes_sent, 0);
    }

    #[tokio::test]
    async fn test_broadcast_aborts_on_unreachable_peer() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let ex = exchange("a");
        ex.node().seed(NodeRecord::new("b", format!("http://{}", dead)));

        let result = ex.broadcast().await;
        assert!(matches!(result, Err(ExchangeError::Transport(_))));
        let stats = ex.stats();
        assert_eq!(stats.rounds_failed, 1);
        assert_eq!(stats.sequence, 1);
    }
}
