//! Shared local state
//!
//! The node's own record and its registry live behind one mutex. Every method
//! here is a single critical section, so a concurrent reader never sees a
//! sequence bump without its payload, or a half-merged registry.

use parking_lot::Mutex;
use rumor_core::{encode_record, MergeOutcome, NodeId, NodeRecord, PayloadSource};
use std::sync::Arc;

/// Reply material produced while handling a push
#[derive(Debug)]
pub struct Reconciled {
    pub outcome: MergeOutcome,
    /// Our re-encoded record, present when we had newer data for the sender
    pub reply: Option<Vec<u8>>,
}

/// Snapshot prepared for one broadcast round
#[derive(Debug)]
pub struct Outbound {
    pub sequence: u64,
    pub body: Vec<u8>,
    pub targets: Vec<String>,
}

/// Lock-guarded holder of this node's record
pub struct LocalNode {
    id: NodeId,
    address: String,
    record: Mutex<NodeRecord>,
    payloads: Arc<dyn PayloadSource>,
}

impl LocalNode {
    pub fn new(record: NodeRecord, payloads: Arc<dyn PayloadSource>) -> Self {
        Self {
            id: record.id.clone(),
            address: record.address.clone(),
            record: Mutex::new(record),
            payloads,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Seed a known peer
    pub fn seed(&self, peer: NodeRecord) -> bool {
        self.record.lock().add_peer(peer)
    }

    /// Clone of the full record
    pub fn snapshot(&self) -> NodeRecord {
        self.record.lock().clone()
    }

    pub fn peer_count(&self) -> usize {
        self.record.lock().peer_count()
    }

    pub fn sequence(&self) -> u64 {
        self.record.lock().sequence
    }

    /// Advance once, encode once, and list every push target
    pub fn advance_and_encode(&self) -> rumor_core::Result<Outbound> {
        let mut record = self.record.lock();
        record.advance(self.payloads.next_payload());
        let body = encode_record(&record)?;
        Ok(Outbound {
            sequence: record.sequence,
            body,
            targets: record.peer_addresses(),
        })
    }

    /// Encode the current record without advancing
    pub fn encode(&self) -> rumor_core::Result<Vec<u8>> {
        encode_record(&self.record.lock())
    }

    pub fn reconcile(&self, incoming: NodeRecord) -> MergeOutcome {
        self.record.lock().reconcile(incoming)
    }

    /// Merge a pushed snapshot and, if the sender is behind, advance and
    /// encode our reply under the same lock.
    pub fn reconcile_and_reply(&self, incoming: NodeRecord) -> rumor_core::Result<Reconciled> {
        let mut record = self.record.lock();
        let outcome = record.reconcile(incoming);
        let reply = if outcome.have_newer {
            record.advance(self.payloads.next_payload());
            Some(encode_record(&record)?)
        } else {
            None
        };
        Ok(Reconciled { outcome, reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumor_core::decode_record;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counting_node(id: &str) -> LocalNode {
        let ticks = Arc::new(AtomicU64::new(0));
        let source = move || Value::from(ticks.fetch_add(1, Ordering::SeqCst) + 1);
        LocalNode::new(NodeRecord::new(id, format!("http://{}", id)), Arc::new(source))
    }

    #[test]
    fn test_advance_and_encode() {
        let node = counting_node("a");
        node.seed(NodeRecord::new("b", "http://b"));

        let outbound = node.advance_and_encode().unwrap();
        assert_eq!(outbound.sequence, 1);
        assert_eq!(outbound.targets, vec!["http://b".to_string()]);

        let sent = decode_record(&outbound.body).unwrap();
        assert_eq!(sent.sequence, 1);
        assert_eq!(sent.payload, json!(1));
        assert_eq!(sent.peer_count(), 1);
    }

    #[test]
    fn test_reply_only_when_sender_is_behind() {
        let node = counting_node("a");
        let mut b = NodeRecord::new("b", "http://b");
        b.sequence = 4;
        node.seed(b.clone());

        b.sequence = 2;
        let stale = node.reconcile_and_reply(b.clone()).unwrap();
        assert!(stale.outcome.have_newer);
        assert_eq!(node.sequence(), 1);
        let reply = decode_record(&stale.reply.unwrap()).unwrap();
        assert_eq!(reply.peer(&NodeId::from("b")).unwrap().sequence, 4);

        b.sequence = 4;
        let fresh = node.reconcile_and_reply(b).unwrap();
        assert!(fresh.reply.is_none());
        assert_eq!(node.sequence(), 1);
    }

    #[test]
    fn test_concurrent_reconcile_keeps_highest() {
        let node = Arc::new(counting_node("a"));
        let handles: Vec<_> = (1..=8u64)
            .map(|sequence| {
                let node = node.clone();
                std::thread::spawn(move || {
                    let mut peer = NodeRecord::new("b", "http://b");
                    peer.sequence = sequence;
                    node.reconcile(peer);
                    node.advance_and_encode().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = node.snapshot();
        assert_eq!(snapshot.sequence, 8);
        assert_eq!(snapshot.payload, json!(8));
        assert_eq!(snapshot.peer(&NodeId::from("b")).unwrap().sequence, 8);
    }
}
