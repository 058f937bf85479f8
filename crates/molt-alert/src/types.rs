//! Core alert types.
//!
//! - [`Timestamp`]: Unix seconds as carried on the wire
//! - [`UnsignedAlert`]: the signed payload fields
//! - [`SignedAlert`]: payload plus its detached signature and exact signed bytes
//! - [`PeerHandle`] / [`PeerInfo`]: what the relay policy knows about a peer

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::DecodeError;

/// Current payload format version.
pub const ALERT_FORMAT_VERSION: i32 = 1;

/// A point in time as signed Unix seconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from Unix seconds.
    #[must_use]
    pub const fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Returns the Unix seconds.
    #[must_use]
    pub const fn as_unix(self) -> i64 {
        self.0
    }

    /// Adds a duration, saturating at the representable maximum.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let secs = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(secs))
    }

    /// Subtracts a duration, saturating at the representable minimum.
    #[must_use]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let secs = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(secs))
    }

    /// Converts to a chrono datetime, if in chrono's range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "@{}", self.0),
        }
    }
}

/// The signed payload of an alert.
///
/// Field order here matches the canonical encoding in [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedAlert {
    /// Payload format version.
    pub version: i32,
    /// Active flooding stops at this time.
    pub relay_until: Timestamp,
    /// The alert is discarded at this time.
    pub expiration: Timestamp,
    /// Operator-assigned logical id.
    pub id: i64,
    /// Every alert with `id <= cancel` is cancelled when positive.
    pub cancel: i64,
    /// Additional ids cancelled by this alert.
    pub cancel_set: BTreeSet<i64>,
    /// Lowest targeted protocol version (inclusive).
    pub min_version: i32,
    /// Highest targeted protocol version (inclusive).
    pub max_version: i32,
    /// Targeted sub-version strings; empty targets everyone.
    pub sub_versions: BTreeSet<String>,
    /// Display priority, higher is more urgent.
    pub priority: i32,
    /// Operator comment, not displayed.
    pub comment: String,
    /// Human-facing banner text.
    pub status_text: String,
    /// Reserved, carried verbatim.
    pub reserved: String,
}

impl Default for UnsignedAlert {
    fn default() -> Self {
        Self {
            version: ALERT_FORMAT_VERSION,
            relay_until: Timestamp::default(),
            expiration: Timestamp::default(),
            id: 0,
            cancel: 0,
            cancel_set: BTreeSet::new(),
            min_version: 0,
            max_version: 0,
            sub_versions: BTreeSet::new(),
            priority: 0,
            comment: String::new(),
            status_text: String::new(),
            reserved: String::new(),
        }
    }
}

impl UnsignedAlert {
    /// Returns true if this alert cancels an alert with the given id.
    #[must_use]
    pub fn cancels_id(&self, id: i64) -> bool {
        (self.cancel > 0 && id <= self.cancel) || self.cancel_set.contains(&id)
    }

    /// Returns true if this alert cancels `other`.
    #[must_use]
    pub fn cancels(&self, other: &Self) -> bool {
        self.cancels_id(other.id)
    }

    /// Returns true if the alert targets a peer with this version and sub-version.
    #[must_use]
    pub fn applies_to(&self, version: i32, sub_version: &str) -> bool {
        (self.min_version..=self.max_version).contains(&version)
            && (self.sub_versions.is_empty() || self.sub_versions.contains(sub_version))
    }

    /// Returns true once `now` has reached the expiration.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expiration
    }

    /// Returns true while the alert is in its active flood phase.
    #[must_use]
    pub fn is_relaying(&self, now: Timestamp) -> bool {
        now < self.relay_until
    }
}

impl fmt::Display for UnsignedAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Alert(")?;
        writeln!(f, "    version     = {}", self.version)?;
        writeln!(f, "    relay_until = {}", self.relay_until)?;
        writeln!(f, "    expiration  = {}", self.expiration)?;
        writeln!(f, "    id          = {}", self.id)?;
        writeln!(f, "    cancel      = {}", self.cancel)?;
        writeln!(f, "    cancel_set  = {:?}", self.cancel_set)?;
        writeln!(f, "    min_version = {}", self.min_version)?;
        writeln!(f, "    max_version = {}", self.max_version)?;
        writeln!(f, "    sub_versions= {:?}", self.sub_versions)?;
        writeln!(f, "    comment     = {:?}", self.comment)?;
        writeln!(f, "    status_text = {:?}", self.status_text)?;
        writeln!(f, "    priority    = {}", self.priority)?;
        write!(f, ")")
    }
}

/// An alert together with its detached signature.
///
/// `raw_payload` holds the exact bytes that were signed. The decoded fields
/// are always derived from those bytes, and the signature is only ever
/// checked against them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAlert {
    alert: UnsignedAlert,
    raw_payload: Vec<u8>,
    signature: Vec<u8>,
}

impl SignedAlert {
    /// Builds a signed alert from the signed bytes and a signature.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if `raw_payload` is not a canonical alert payload.
    pub fn from_parts(raw_payload: Vec<u8>, signature: Vec<u8>) -> Result<Self, DecodeError> {
        let alert = codec::decode(&raw_payload)?;
        Ok(Self {
            alert,
            raw_payload,
            signature,
        })
    }

    /// Assembles a signed alert whose payload was just encoded from `alert`.
    pub(crate) fn assemble(alert: UnsignedAlert, raw_payload: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            alert,
            raw_payload,
            signature,
        }
    }

    /// Returns the decoded payload fields.
    #[must_use]
    pub const fn alert(&self) -> &UnsignedAlert {
        &self.alert
    }

    /// Returns the alert id.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.alert.id
    }

    /// Returns the exact signed bytes.
    #[must_use]
    pub fn raw_payload(&self) -> &[u8] {
        &self.raw_payload
    }

    /// Returns the DER-encoded signature.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Encodes the alert for the wire.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        codec::encode_signed(self)
    }

    /// Returns the double-SHA-256 of the wire encoding.
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        codec::hash256(&self.to_wire())
    }
}

/// Opaque handle for a peer connection, owned by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerHandle(u64);

impl PeerHandle {
    /// Wraps a transport connection id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the transport connection id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// What the relay policy knows about a connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    handle: PeerHandle,
    version: i32,
    sub_version: String,
}

impl PeerInfo {
    /// Creates peer info from the handshake values.
    #[must_use]
    pub fn new(handle: PeerHandle, version: i32, sub_version: impl Into<String>) -> Self {
        Self {
            handle,
            version,
            sub_version: sub_version.into(),
        }
    }

    /// Returns the connection handle.
    #[must_use]
    pub const fn handle(&self) -> PeerHandle {
        self.handle
    }

    /// Returns the advertised protocol version.
    #[must_use]
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Returns the advertised sub-version string.
    #[must_use]
    pub fn sub_version(&self) -> &str {
        &self.sub_version
    }
}
