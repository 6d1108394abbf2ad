//! Last-writer-wins reconciliation
//!
//! Merging an incoming snapshot runs in two phases: first the peers the
//! sender knows about (gossip of gossip), then the sender itself. Only the
//! per-node `sequence` decides which side is newer; payloads are copied, never
//! compared.

use crate::record::{NodeId, NodeRecord};
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use tracing::trace;

/// What a merge revealed about the two sides
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The incoming snapshot taught us something
    pub received_newer: bool,
    /// We hold a fact the sender is behind on
    pub have_newer: bool,
}

impl MergeOutcome {
    /// Neither side had anything for the other
    pub fn is_unchanged(&self) -> bool {
        !self.received_newer && !self.have_newer
    }
}

impl NodeRecord {
    /// Absorb an incoming snapshot into our registry.
    ///
    /// Never lowers a stored sequence, never stores our own id, and strips
    /// nested peers from everything it adopts.
    pub fn reconcile(&mut self, mut incoming: NodeRecord) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        // Keyed by the record's own id; the map key is not trusted.
        for (_, peer) in incoming.peers.drain() {
            // The sender's own entry comes from its top-level fields below.
            if peer.id == self.id || peer.id == incoming.id {
                continue;
            }
            let id = peer.id.clone();
            self.absorb(id, peer, &mut outcome);
        }

        if incoming.id != self.id {
            let id = incoming.id.clone();
            self.absorb(id, incoming, &mut outcome);
        }

        debug_assert!(self.is_depth_bounded());
        outcome
    }

    fn absorb(&mut self, id: NodeId, candidate: NodeRecord, outcome: &mut MergeOutcome) {
        match self.peers.entry(id) {
            Entry::Vacant(slot) => {
                trace!(peer = %slot.key(), sequence = candidate.sequence, "adopting peer");
                slot.insert(candidate.into_summary());
                outcome.received_newer = true;
            }
            Entry::Occupied(mut slot) => {
                let local = slot.get_mut();
                match local.sequence.cmp(&candidate.sequence) {
                    Ordering::Less => {
                        trace!(
                            peer = %local.id,
                            from = local.sequence,
                            to = candidate.sequence,
                            "peer advanced"
                        );
                        local.sequence = candidate.sequence;
                        local.payload = candidate.payload;
                        outcome.received_newer = true;
                    }
                    Ordering::Greater => outcome.have_newer = true,
                    Ordering::Equal => {}
                }
            }
        }
    }
}
