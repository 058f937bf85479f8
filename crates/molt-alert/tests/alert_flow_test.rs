//! End-to-end tests for the alert lifecycle.
//!
//! Covers:
//! 1. Operator signing and network-key verification
//! 2. Admission, duplicate detection and relay gating
//! 3. Cancellation dominance across arrival orders
//! 4. Node-to-node propagation through the shared service

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use k256::ecdsa::SigningKey;
use molt_alert::{
    AdmitResult, AlertFields, AlertRegistry, AlertService, AlertSigningKey, AlertTransport,
    BoxFuture, Network, PeerDirectory, PeerHandle, PeerInfo, ReceiveOutcome, RelayPolicy,
    ResolvedAlertConfig, SignedAlert, Timestamp, TransportError, UnsignedAlert, build_and_sign,
    decode_signed, prepare_broadcast, sign, verify,
};
use parking_lot::Mutex;
use rand::rngs::OsRng;

// ============================================================================
// Helper Functions
// ============================================================================

const NOW: Timestamp = Timestamp::from_unix(1_700_000_000);

fn create_key() -> AlertSigningKey {
    AlertSigningKey::from(SigningKey::random(&mut OsRng))
}

fn upgrade_alert() -> UnsignedAlert {
    UnsignedAlert {
        version: 1,
        relay_until: Timestamp::from_unix(NOW.as_unix() + 900),
        expiration: Timestamp::from_unix(NOW.as_unix() + 1_314_000),
        id: 1040,
        min_version: 70002,
        max_version: 70002,
        priority: 5000,
        status_text: "URGENT".to_string(),
        ..UnsignedAlert::default()
    }
}

fn client(id: u64) -> PeerInfo {
    PeerInfo::new(PeerHandle::new(id), 70002, "/Satoshi:0.9.0/")
}

// ============================================================================
// Phase 1: Signing and Verification
// ============================================================================

#[test]
fn signed_alert_verifies_only_under_its_key() {
    let key = create_key();
    let signed = sign(upgrade_alert(), &key).unwrap();

    assert!(verify(&signed, &key.public_key()));
    assert!(!verify(&signed, &create_key().public_key()));
}

#[test]
fn wire_bytes_survive_transit() {
    let key = create_key();
    let signed = sign(upgrade_alert(), &key).unwrap();

    let received = decode_signed(&signed.to_wire()).unwrap();
    assert_eq!(received, signed);
    assert!(verify(&received, &key.public_key()));
}

#[test]
fn operator_self_check_guards_network_mixups() {
    let main = create_key();
    let test = create_key();
    let fields = AlertFields::new(1, "test network maintenance");

    assert!(prepare_broadcast(&fields, &test, &test.public_key(), NOW).is_ok());
    assert!(prepare_broadcast(&fields, &test, &main.public_key(), NOW).is_err());
}

// ============================================================================
// Phase 2: Admission and Relay
// ============================================================================

#[test]
fn upgrade_alert_lifecycle() {
    let key = create_key();
    let signed = sign(upgrade_alert(), &key).unwrap();
    let mut registry = AlertRegistry::new();
    let mut policy = RelayPolicy::new();

    assert_eq!(registry.admit(signed.clone(), NOW), AdmitResult::Stored);
    assert_eq!(registry.admit(signed.clone(), NOW), AdmitResult::Duplicate);
    assert_eq!(registry.len(), 1);

    let peer = client(1);
    assert!(policy.should_relay(&signed, &peer, NOW));
    assert!(!policy.should_relay(&signed, &peer, NOW));

    let old_client = PeerInfo::new(PeerHandle::new(2), 70001, "/Satoshi:0.8.6/");
    assert!(!policy.should_relay(&signed, &old_client, NOW));

    assert_eq!(
        registry.status_bar(NOW, 70002, "/Satoshi:0.9.0/"),
        Some("URGENT")
    );
    assert_eq!(registry.status_bar(NOW, 70001, "/Satoshi:0.8.6/"), None);

    let expiry = upgrade_alert().expiration;
    assert_eq!(registry.sweep_expired(expiry), vec![1040]);
    assert!(registry.is_empty());
}

#[test]
fn expired_alert_is_rejected() {
    let key = create_key();
    let signed = sign(upgrade_alert(), &key).unwrap();
    let mut registry = AlertRegistry::new();

    let after = Timestamp::from_unix(upgrade_alert().expiration.as_unix() + 1);
    assert_eq!(registry.admit(signed, after), AdmitResult::Expired);
    assert!(registry.is_empty());
}

// ============================================================================
// Phase 3: Cancellation
// ============================================================================

#[test]
fn cancellation_dominates_in_either_order() {
    let key = create_key();
    let target = sign(UnsignedAlert { id: 5, ..upgrade_alert() }, &key).unwrap();
    let canceller = sign(
        UnsignedAlert {
            id: 6,
            cancel: 5,
            status_text: "resolved".to_string(),
            ..upgrade_alert()
        },
        &key,
    )
    .unwrap();

    let mut forward = AlertRegistry::new();
    assert_eq!(forward.admit(target.clone(), NOW), AdmitResult::Stored);
    assert_eq!(forward.admit(canceller.clone(), NOW), AdmitResult::Stored);
    assert!(!forward.contains(5));

    let mut reverse = AlertRegistry::new();
    assert_eq!(reverse.admit(canceller, NOW), AdmitResult::Stored);
    assert_eq!(reverse.admit(target, NOW), AdmitResult::AlreadyCancelled);

    let forward_ids: Vec<i64> = forward.alerts().map(SignedAlert::id).collect();
    let reverse_ids: Vec<i64> = reverse.alerts().map(SignedAlert::id).collect();
    assert_eq!(forward_ids, reverse_ids);
}

#[test]
fn cancel_set_removes_listed_ids() {
    let key = create_key();
    let mut registry = AlertRegistry::new();
    for id in [10, 11, 12] {
        let signed = sign(UnsignedAlert { id, ..upgrade_alert() }, &key).unwrap();
        assert!(registry.admit(signed, NOW).is_stored());
    }

    let canceller = sign(
        UnsignedAlert {
            id: 13,
            cancel_set: [10, 12].into_iter().collect(),
            ..upgrade_alert()
        },
        &key,
    )
    .unwrap();
    assert!(registry.admit(canceller, NOW).is_stored());

    let remaining: Vec<i64> = registry.alerts().map(SignedAlert::id).collect();
    assert_eq!(remaining, vec![11, 13]);
}

// ============================================================================
// Phase 4: Propagation Between Nodes
// ============================================================================

/// In-memory network: every node's transport delivers into an inbox.
#[derive(Default)]
struct SimNetwork {
    inbox: Mutex<Vec<(PeerHandle, PeerHandle, Vec<u8>)>>,
}

struct NodeLink {
    me: PeerHandle,
    neighbours: Vec<PeerInfo>,
    network: Arc<SimNetwork>,
}

impl PeerDirectory for NodeLink {
    fn connected_peers(&self) -> Vec<PeerInfo> {
        self.neighbours.clone()
    }
}

impl AlertTransport for NodeLink {
    fn send_raw<'a>(
        &'a self,
        peer: PeerHandle,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.network
                .inbox
                .lock()
                .push((self.me, peer, bytes.to_vec()));
            Ok(())
        })
    }
}

fn node(
    me: u64,
    neighbours: &[u64],
    network: &Arc<SimNetwork>,
    key: &AlertSigningKey,
) -> AlertService {
    let link = Arc::new(NodeLink {
        me: PeerHandle::new(me),
        neighbours: neighbours.iter().map(|&id| client(id)).collect(),
        network: Arc::clone(network),
    });
    let config = ResolvedAlertConfig::new(Network::Main, key.public_key(), Duration::from_secs(60));
    AlertService::new(
        config,
        Arc::clone(&link) as Arc<dyn PeerDirectory>,
        link as Arc<dyn AlertTransport>,
    )
}

#[tokio::test]
async fn alert_floods_a_line_of_nodes_once() {
    let key = create_key();
    let network = Arc::new(SimNetwork::default());
    let mut nodes = HashMap::new();
    nodes.insert(1, node(1, &[2], &network, &key));
    nodes.insert(2, node(2, &[1, 3], &network, &key));
    nodes.insert(3, node(3, &[2], &network, &key));

    let fields = AlertFields::new(1040, "URGENT")
        .with_versions(70002, 70002)
        .with_priority(5000);
    let signed = build_and_sign(&fields, &key, NOW).unwrap();

    let outcome = nodes[&1].broadcast(signed, NOW).await;
    assert_eq!(outcome.admit_result(), Some(AdmitResult::Stored));

    let mut deliveries = 0;
    loop {
        let pending: Vec<_> = network.inbox.lock().drain(..).collect();
        if pending.is_empty() {
            break;
        }
        for (from, to, bytes) in pending {
            deliveries += 1;
            nodes[&to.id()].receive(&bytes, from, NOW).await;
        }
    }

    // 1 -> 2, then 2 -> 3; nothing flows back to a sender.
    assert_eq!(deliveries, 2);
    for service in nodes.values() {
        assert_eq!(service.alert_count(), 1);
        assert_eq!(
            service.status_bar(NOW, 70002, "/Satoshi:0.9.0/"),
            Some("URGENT".to_string())
        );
    }
}

#[tokio::test]
async fn forged_alert_does_not_propagate() {
    let key = create_key();
    let network = Arc::new(SimNetwork::default());
    let service = node(2, &[1, 3], &network, &key);

    let forged = sign(upgrade_alert(), &create_key()).unwrap();
    let outcome = service.receive(&forged.to_wire(), PeerHandle::new(1), NOW).await;

    assert_eq!(outcome, ReceiveOutcome::BadSignature);
    assert!(network.inbox.lock().is_empty());
}
