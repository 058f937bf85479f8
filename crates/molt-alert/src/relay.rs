//! Relay policy: which alert goes to which peer, and when.
//!
//! An alert is flooded to every eligible peer until `relay_until`. After
//! that, it is only offered to peers during their initial post-connect
//! exchange, until it expires. Each peer receives each alert id at most
//! once; the sent marker is recorded before the caller performs the send.

use std::collections::HashSet;

use tracing::trace;

use crate::types::{PeerHandle, PeerInfo, SignedAlert, Timestamp};

/// Per-peer relay bookkeeping.
#[derive(Debug, Default)]
pub struct RelayPolicy {
    /// `(peer, alert id)` pairs already sent.
    sent: HashSet<(PeerHandle, i64)>,
    /// Peers still in their initial exchange after connecting.
    fresh_peers: HashSet<PeerHandle>,
}

impl RelayPolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether to send `alert` to `peer`, marking it sent if so.
    pub fn should_relay(&mut self, alert: &SignedAlert, peer: &PeerInfo, now: Timestamp) -> bool {
        let handle = peer.handle();
        let id = alert.id();
        let fields = alert.alert();

        if self.sent.contains(&(handle, id)) {
            return false;
        }
        if peer.version() < fields.min_version || peer.version() > fields.max_version {
            return false;
        }
        if !fields.sub_versions.is_empty() && !fields.sub_versions.contains(peer.sub_version()) {
            return false;
        }
        if fields.is_expired(now) {
            return false;
        }
        if !fields.is_relaying(now) && !self.fresh_peers.contains(&handle) {
            return false;
        }

        self.sent.insert((handle, id));
        trace!(alert_id = id, peer = %handle, "relay approved");
        true
    }

    /// Registers a newly connected peer for the passive exchange.
    pub fn peer_connected(&mut self, handle: PeerHandle) {
        self.fresh_peers.insert(handle);
    }

    /// Ends the passive exchange for `handle`.
    pub fn initial_sync_complete(&mut self, handle: PeerHandle) {
        self.fresh_peers.remove(&handle);
    }

    /// Drops all state for a disconnected peer.
    pub fn peer_disconnected(&mut self, handle: PeerHandle) {
        self.fresh_peers.remove(&handle);
        self.sent.retain(|(peer, _)| *peer != handle);
    }

    /// Records that `handle` already has `id` (e.g. it sent the alert to us).
    ///
    /// Returns false if it was already recorded.
    pub fn mark_sent(&mut self, handle: PeerHandle, id: i64) -> bool {
        self.sent.insert((handle, id))
    }

    /// Drops sent markers for an alert id that left the registry or was replaced.
    pub fn forget_alert(&mut self, id: i64) {
        self.sent.retain(|(_, alert_id)| *alert_id != id);
    }

    /// Returns true if `id` was sent to `handle`.
    #[must_use]
    pub fn was_sent(&self, handle: PeerHandle, id: i64) -> bool {
        self.sent.contains(&(handle, id))
    }

    /// Returns true if `handle` is still in its initial exchange.
    #[must_use]
    pub fn is_fresh(&self, handle: PeerHandle) -> bool {
        self.fresh_peers.contains(&handle)
    }

    /// Returns the number of sent markers.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }
}
