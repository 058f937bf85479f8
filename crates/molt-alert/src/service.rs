//! Shared alert runtime for a node.
//!
//! [`AlertService`] owns the registry and relay bookkeeping behind a single
//! mutex and talks to the node through two narrow collaborators:
//!
//! - [`PeerDirectory`]: the current set of connected peers
//! - [`AlertTransport`]: fire-and-forget delivery of encoded alerts
//!
//! Every admit, sweep and sent-marker update happens under the lock. Relay
//! decisions are made and recorded before any send starts, and sends run
//! after the lock is released, so a slow peer can neither block admission
//! nor cause the same alert to be sent to it twice.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::ResolvedAlertConfig;
use crate::error::TransportError;
use crate::registry::{AdmitResult, AlertRegistry};
use crate::relay::RelayPolicy;
use crate::types::{PeerHandle, PeerInfo, SignedAlert, Timestamp};
use crate::verifier;

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the node's currently connected peers.
pub trait PeerDirectory: Send + Sync {
    /// Returns a snapshot of connected peers.
    fn connected_peers(&self) -> Vec<PeerInfo>;
}

/// Delivery of encoded alerts to peers.
///
/// Failures are reported but never retried by the alert service.
pub trait AlertTransport: Send + Sync {
    /// Sends wire bytes to one peer.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the send fails.
    fn send_raw<'a>(
        &'a self,
        peer: PeerHandle,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// Result of handing an alert to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The bytes did not decode; the message was dropped.
    Malformed,
    /// The signature did not verify under the network key; dropped.
    BadSignature,
    /// The alert reached the registry.
    Admitted {
        /// The registry's decision.
        result: AdmitResult,
        /// Peers the transport accepted the alert for.
        relayed: usize,
    },
}

impl ReceiveOutcome {
    /// Returns the admission result, if the alert got that far.
    #[must_use]
    pub const fn admit_result(&self) -> Option<AdmitResult> {
        match self {
            Self::Admitted { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// Returns the number of peers the alert was relayed to.
    #[must_use]
    pub const fn relayed(&self) -> usize {
        match self {
            Self::Admitted { relayed, .. } => *relayed,
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
struct AlertState {
    registry: AlertRegistry,
    policy: RelayPolicy,
}

/// The node's alert runtime.
pub struct AlertService {
    config: ResolvedAlertConfig,
    state: Mutex<AlertState>,
    peers: Arc<dyn PeerDirectory>,
    transport: Arc<dyn AlertTransport>,
}

impl std::fmt::Debug for AlertService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertService")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl AlertService {
    /// Creates a service for the configured network.
    #[must_use]
    pub fn new(
        config: ResolvedAlertConfig,
        peers: Arc<dyn PeerDirectory>,
        transport: Arc<dyn AlertTransport>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(AlertState::default()),
            peers,
            transport,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolvedAlertConfig {
        &self.config
    }

    /// Handles alert bytes received from a peer.
    ///
    /// Malformed, forged and rejected alerts are dropped and logged; none of
    /// them is an error for the connection.
    pub async fn receive(&self, bytes: &[u8], from: PeerHandle, now: Timestamp) -> ReceiveOutcome {
        let signed = match codec::decode_signed(bytes) {
            Ok(signed) => signed,
            Err(e) => {
                debug!(peer = %from, error = %e, "dropping malformed alert");
                return ReceiveOutcome::Malformed;
            }
        };
        self.process(signed, Some(from), now).await
    }

    /// Admits a locally signed alert and floods it to connected peers.
    pub async fn broadcast(&self, signed: SignedAlert, now: Timestamp) -> ReceiveOutcome {
        let outcome = self.process(signed, None, now).await;
        info!(relayed = outcome.relayed(), "alert broadcast complete");
        outcome
    }

    async fn process(
        &self,
        signed: SignedAlert,
        from: Option<PeerHandle>,
        now: Timestamp,
    ) -> ReceiveOutcome {
        let id = signed.id();
        if !verifier::verify(&signed, self.config.public_key()) {
            warn!(
                alert_id = id,
                network = %self.config.network(),
                "dropping alert with invalid signature"
            );
            return ReceiveOutcome::BadSignature;
        }

        let peers = self.peers.connected_peers();
        let (result, targets) = {
            let mut state = self.state.lock();
            let state = &mut *state;

            let replacing = state.registry.contains(id);
            let admission = state.registry.admit_tracked(signed.clone(), now);
            for removed in admission.removed() {
                state.policy.forget_alert(removed);
            }

            let result = admission.result;
            if !result.is_stored() {
                debug!(alert_id = id, result = %result, "alert not relayed");
                return ReceiveOutcome::Admitted { result, relayed: 0 };
            }
            if replacing {
                state.policy.forget_alert(id);
            }
            if let Some(from) = from {
                state.policy.mark_sent(from, id);
            }

            let targets: Vec<PeerHandle> = peers
                .iter()
                .filter(|peer| state.policy.should_relay(&signed, peer, now))
                .map(PeerInfo::handle)
                .collect();
            (result, targets)
        };

        let wire = signed.to_wire();
        let relayed = self.dispatch(&targets, &wire, id).await;
        ReceiveOutcome::Admitted { result, relayed }
    }

    /// Offers every stored alert to a newly connected peer.
    ///
    /// Returns the number of alerts the transport accepted.
    pub async fn peer_connected(&self, peer: &PeerInfo, now: Timestamp) -> usize {
        let handle = peer.handle();
        let outgoing: Vec<(i64, Vec<u8>)> = {
            let mut state = self.state.lock();
            let state = &mut *state;

            state.policy.peer_connected(handle);
            let outgoing = state
                .registry
                .by_priority(now)
                .into_iter()
                .filter(|signed| state.policy.should_relay(signed, peer, now))
                .map(|signed| (signed.id(), signed.to_wire()))
                .collect();
            state.policy.initial_sync_complete(handle);
            outgoing
        };

        debug!(peer = %handle, alerts = outgoing.len(), "initial alert exchange");
        let mut delivered = 0;
        for (id, wire) in &outgoing {
            delivered += self.dispatch(&[handle], wire, *id).await;
        }
        delivered
    }

    /// Drops relay state for a disconnected peer.
    pub fn peer_disconnected(&self, handle: PeerHandle) {
        self.state.lock().policy.peer_disconnected(handle);
    }

    /// Removes expired alerts. Returns the removed ids.
    pub fn sweep(&self, now: Timestamp) -> Vec<i64> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let expired = state.registry.sweep_expired(now);
        for id in &expired {
            state.policy.forget_alert(*id);
        }
        expired
    }

    /// Returns the banner of the most urgent alert targeting this client.
    #[must_use]
    pub fn status_bar(&self, now: Timestamp, version: i32, sub_version: &str) -> Option<String> {
        self.state
            .lock()
            .registry
            .status_bar(now, version, sub_version)
            .map(str::to_string)
    }

    /// Returns unexpired alerts, most urgent first.
    #[must_use]
    pub fn alerts_by_priority(&self, now: Timestamp) -> Vec<SignedAlert> {
        self.state
            .lock()
            .registry
            .by_priority(now)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns the stored alert with `id`.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<SignedAlert> {
        self.state.lock().registry.get(id).cloned()
    }

    /// Returns the number of stored alerts.
    #[must_use]
    pub fn alert_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Starts a periodic expiry sweep on the tokio runtime.
    ///
    /// Returns a handle to control the task and monitor its progress.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let handle = SweeperHandle::new();
        handle.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&handle.running);
        let sweeps = Arc::clone(&handle.sweeps);
        let service = Arc::clone(self);
        let period = self.config.sweep_interval();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);

            while running.load(Ordering::SeqCst) {
                interval_timer.tick().await;

                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let removed = service.sweep(Timestamp::now());
                if !removed.is_empty() {
                    info!(count = removed.len(), "swept expired alerts");
                }
                sweeps.fetch_add(1, Ordering::SeqCst);
            }
        });

        handle
    }

    async fn dispatch(&self, targets: &[PeerHandle], wire: &[u8], id: i64) -> usize {
        let sends = targets
            .iter()
            .map(|&peer| async move { (peer, self.transport.send_raw(peer, wire).await) });

        let mut delivered = 0;
        for (peer, result) in join_all(sends).await {
            match result {
                Ok(()) => {
                    debug!(alert_id = id, peer = %peer, "relayed alert");
                    delivered += 1;
                }
                Err(e) => warn!(alert_id = id, peer = %peer, error = %e, "alert send failed"),
            }
        }
        delivered
    }
}

/// Handle for controlling the expiry sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    running: Arc<AtomicBool>,
    sweeps: Arc<AtomicU64>,
}

impl SweeperHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            sweeps: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns true while the sweeper is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the number of completed sweeps.
    #[must_use]
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }

    /// Stops the sweeper after its current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
