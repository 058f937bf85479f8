//! Operator-facing alert composition.
//!
//! [`AlertFields`] is the explicit description of an alert an operator wants
//! to send. [`build_and_sign`] turns it into a [`SignedAlert`];
//! [`prepare_broadcast`] additionally runs the wire round trip and checks the
//! result against the network key, so a bad alert is never handed to the
//! network.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec;
use crate::error::SignError;
use crate::keys::{AlertPublicKey, AlertSigningKey};
use crate::signer;
use crate::types::{ALERT_FORMAT_VERSION, SignedAlert, Timestamp, UnsignedAlert};
use crate::verifier;

/// Default active relay window (15 minutes).
pub const DEFAULT_RELAY_FOR: Duration = Duration::from_secs(15 * 60);

/// What an operator wants to broadcast.
///
/// Times are relative to the moment of signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertFields {
    /// Logical alert id.
    pub id: i64,
    /// Cancel every alert with an id at or below this value.
    pub cancel: i64,
    /// Additional ids to cancel.
    pub cancel_set: BTreeSet<i64>,
    /// Lowest targeted protocol version.
    pub min_version: i32,
    /// Highest targeted protocol version.
    pub max_version: i32,
    /// Targeted sub-versions; empty targets everyone.
    pub sub_versions: BTreeSet<String>,
    /// Display priority.
    pub priority: i32,
    /// Operator comment.
    pub comment: String,
    /// Banner text.
    pub status_text: String,
    /// Active flood window, in seconds.
    pub relay_for_secs: u64,
    /// Lifetime until expiration, in seconds.
    pub expire_after_secs: u64,
}

impl Default for AlertFields {
    fn default() -> Self {
        Self {
            id: 0,
            cancel: 0,
            cancel_set: BTreeSet::new(),
            min_version: 0,
            max_version: i32::MAX,
            sub_versions: BTreeSet::new(),
            priority: 0,
            comment: String::new(),
            status_text: String::new(),
            relay_for_secs: DEFAULT_RELAY_FOR.as_secs(),
            expire_after_secs: 24 * 60 * 60,
        }
    }
}

impl AlertFields {
    /// Creates fields for `id` with the given banner.
    #[must_use]
    pub fn new(id: i64, status_text: impl Into<String>) -> Self {
        Self {
            id,
            status_text: status_text.into(),
            ..Self::default()
        }
    }

    /// Targets an inclusive protocol-version range.
    #[must_use]
    pub const fn with_versions(mut self, min_version: i32, max_version: i32) -> Self {
        self.min_version = min_version;
        self.max_version = max_version;
        self
    }

    /// Restricts the alert to a client sub-version.
    #[must_use]
    pub fn with_sub_version(mut self, sub_version: impl Into<String>) -> Self {
        self.sub_versions.insert(sub_version.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Cancels every alert with an id at or below `cancel`.
    #[must_use]
    pub const fn with_cancel(mut self, cancel: i64) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the relay window.
    #[must_use]
    pub const fn with_relay_for(mut self, relay_for: Duration) -> Self {
        self.relay_for_secs = relay_for.as_secs();
        self
    }

    /// Sets the lifetime.
    #[must_use]
    pub const fn with_expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after_secs = expire_after.as_secs();
        self
    }

    /// Resolves relative times against `now`.
    #[must_use]
    pub fn to_unsigned(&self, now: Timestamp) -> UnsignedAlert {
        UnsignedAlert {
            version: ALERT_FORMAT_VERSION,
            relay_until: now.saturating_add(Duration::from_secs(self.relay_for_secs)),
            expiration: now.saturating_add(Duration::from_secs(self.expire_after_secs)),
            id: self.id,
            cancel: self.cancel,
            cancel_set: self.cancel_set.clone(),
            min_version: self.min_version,
            max_version: self.max_version,
            sub_versions: self.sub_versions.clone(),
            priority: self.priority,
            comment: self.comment.clone(),
            status_text: self.status_text.clone(),
            reserved: String::new(),
        }
    }
}

/// Builds and signs an alert from operator fields.
///
/// # Errors
///
/// Returns a [`SignError`] if signing fails.
pub fn build_and_sign(
    fields: &AlertFields,
    key: &AlertSigningKey,
    now: Timestamp,
) -> Result<SignedAlert, SignError> {
    signer::sign(fields.to_unsigned(now), key)
}

/// Audit record of a signed alert ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertReport {
    /// The signed alert.
    pub alert: SignedAlert,
    /// Hex of the double-SHA-256 of the wire encoding.
    pub hash_hex: String,
    /// Hex of the signed payload bytes.
    pub payload_hex: String,
    /// Hex of the DER signature.
    pub signature_hex: String,
}

impl AlertReport {
    fn new(alert: SignedAlert) -> Self {
        Self {
            hash_hex: hex::encode(alert.hash()),
            payload_hex: hex::encode(alert.raw_payload()),
            signature_hex: hex::encode(alert.signature()),
            alert,
        }
    }
}

impl fmt::Display for AlertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hash={}", self.hash_hex)?;
        writeln!(f, "{}", self.alert.alert())?;
        writeln!(f, "payload={}", self.payload_hex)?;
        write!(f, "signature={}", self.signature_hex)
    }
}

/// Signs an alert and checks it survives the wire round trip and verifies
/// under the network key.
///
/// # Errors
///
/// Returns `SignError::SelfCheckFailed` if the decoded alert differs or does
/// not verify (for example, the key belongs to the other network).
pub fn prepare_broadcast(
    fields: &AlertFields,
    key: &AlertSigningKey,
    network_key: &AlertPublicKey,
    now: Timestamp,
) -> Result<AlertReport, SignError> {
    let signed = build_and_sign(fields, key, now)?;

    let decoded = codec::decode_signed(&signed.to_wire())
        .map_err(|e| SignError::SelfCheckFailed(format!("wire round trip: {e}")))?;
    if !verifier::verify(&decoded, network_key) {
        return Err(SignError::SelfCheckFailed(
            "signature does not verify under the network alert key".to_string(),
        ));
    }
    if decoded.raw_payload() != signed.raw_payload() || decoded.signature() != signed.signature() {
        return Err(SignError::SelfCheckFailed(
            "wire round trip changed the alert".to_string(),
        ));
    }

    let report = AlertReport::new(decoded);
    info!(alert_id = fields.id, hash = %report.hash_hex, "alert ready for broadcast");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    const NOW: Timestamp = Timestamp::from_unix(1_700_000_000);

    fn key() -> AlertSigningKey {
        AlertSigningKey::from(SigningKey::random(&mut OsRng))
    }

    fn fields() -> AlertFields {
        AlertFields::new(1040, "URGENT: Upgrade required")
            .with_versions(70002, 70002)
            .with_priority(5000)
            .with_expire_after(Duration::from_secs(365 * 60 * 60))
    }

    #[test]
    fn defaults_relay_for_fifteen_minutes() {
        let defaults = AlertFields::default();
        assert_eq!(defaults.relay_for_secs, 900);
        assert_eq!(defaults.max_version, i32::MAX);
    }

    #[test]
    fn to_unsigned_resolves_times() {
        let unsigned = fields().to_unsigned(NOW);
        assert_eq!(unsigned.relay_until.as_unix(), NOW.as_unix() + 900);
        assert_eq!(unsigned.expiration.as_unix(), NOW.as_unix() + 1_314_000);
        assert_eq!(unsigned.id, 1040);
        assert_eq!(unsigned.version, ALERT_FORMAT_VERSION);
    }

    #[test]
    fn fields_deserialize_with_defaults() {
        let parsed: AlertFields =
            serde_json::from_str(r#"{"id": 7, "status_text": "hello", "cancel": 6}"#).unwrap();
        assert_eq!(parsed.id, 7);
        assert_eq!(parsed.cancel, 6);
        assert_eq!(parsed.relay_for_secs, 900);
    }

    #[test]
    fn build_and_sign_verifies() {
        let key = key();
        let signed = build_and_sign(&fields(), &key, NOW).unwrap();
        assert!(verifier::verify(&signed, &key.public_key()));
        assert_eq!(signed.alert().priority, 5000);
    }

    #[test]
    fn prepare_broadcast_reports_hex() {
        let key = key();
        let report = prepare_broadcast(&fields(), &key, &key.public_key(), NOW).unwrap();
        assert_eq!(report.hash_hex.len(), 64);
        assert_eq!(report.payload_hex, hex::encode(report.alert.raw_payload()));
        assert!(report.signature_hex.starts_with("30"));

        let printed = report.to_string();
        assert!(printed.starts_with("hash="));
        assert!(printed.contains("URGENT: Upgrade required"));
    }

    #[test]
    fn prepare_broadcast_rejects_wrong_network_key() {
        let key = key();
        let other = self::key().public_key();
        let result = prepare_broadcast(&fields(), &key, &other, NOW);
        assert!(matches!(result, Err(SignError::SelfCheckFailed(_))));
    }
}
