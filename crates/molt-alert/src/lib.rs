//! # molt-alert
//!
//! Signed network alerts for the MOLT network.
//!
//! A small set of operators holds the network alert key. Alerts signed with
//! it are flooded between nodes, shown to targeted clients as a status
//! banner, and retired by later alerts or by expiry.
//!
//! This crate provides:
//!
//! - A strict, canonical binary codec for alert payloads
//! - ECDSA secp256k1 signing and verification over the exact payload bytes
//! - A registry applying cancellation, duplicate detection and expiry
//! - A relay policy deciding which alert goes to which peer, exactly once
//! - A shared service wiring both to an injected peer directory and transport
//!
//! ## Core Types
//!
//! - [`UnsignedAlert`]: the alert fields an operator signs
//! - [`SignedAlert`]: payload bytes plus signature, as seen on the wire
//! - [`AlertRegistry`]: the node's set of live alerts
//! - [`RelayPolicy`]: per-peer relay bookkeeping
//! - [`AlertService`]: the concurrent runtime used by a node
//!
//! ## Example
//!
//! ```rust
//! use molt_alert::{
//!     AdmitResult, AlertFields, AlertRegistry, AlertSigningKey, Timestamp, build_and_sign,
//!     verify,
//! };
//!
//! let key = AlertSigningKey::from_bytes(&[7u8; 32]).unwrap();
//! let now = Timestamp::from_unix(1_700_000_000);
//!
//! let fields = AlertFields::new(1040, "URGENT: Upgrade required")
//!     .with_versions(70002, 70002)
//!     .with_priority(5000);
//! let signed = build_and_sign(&fields, &key, now).unwrap();
//! assert!(verify(&signed, &key.public_key()));
//!
//! let mut registry = AlertRegistry::new();
//! assert_eq!(registry.admit(signed.clone(), now), AdmitResult::Stored);
//! assert_eq!(registry.admit(signed, now), AdmitResult::Duplicate);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod operator;
pub mod registry;
pub mod relay;
pub mod service;
pub mod signer;
pub mod types;
pub mod verifier;

pub use codec::{
    MAX_PAYLOAD_SIZE, MAX_SIGNATURE_SIZE, decode, decode_signed, encode, encode_signed, hash256,
};
pub use config::{AlertConfig, ResolvedAlertConfig};
pub use error::{AlertError, DecodeError, KeyError, Result, SignError, TransportError};
pub use keys::{AlertPublicKey, AlertSigningKey, Network, NetworkKeys};
pub use operator::{AlertFields, AlertReport, DEFAULT_RELAY_FOR, build_and_sign, prepare_broadcast};
pub use registry::{AdmitResult, Admission, AlertRegistry};
pub use relay::RelayPolicy;
pub use service::{
    AlertService, AlertTransport, BoxFuture, PeerDirectory, ReceiveOutcome, SweeperHandle,
};
pub use signer::sign;
pub use types::{ALERT_FORMAT_VERSION, PeerHandle, PeerInfo, SignedAlert, Timestamp, UnsignedAlert};
pub use verifier::{verify, verify_payload};
