//! Error types for molt-alert.

use thiserror::Error;

use crate::types::PeerHandle;

/// Errors raised while decoding wire bytes into an alert.
///
/// A decode failure is always local: the message is dropped and never
/// admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before a field was complete.
    #[error("truncated input: needed {needed} more bytes")]
    Truncated {
        /// Bytes missing from the input.
        needed: usize,
    },

    /// Bytes remained after the last field.
    #[error("trailing bytes after alert: {count}")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        count: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A compact size was not minimally encoded.
    #[error("non-canonical compact size")]
    NonCanonicalSize,

    /// A set was not in strictly ascending order.
    #[error("set entries are not strictly ascending")]
    UnsortedSet,

    /// The payload or signature exceeded the protocol bound.
    #[error("length {len} exceeds limit {max}")]
    TooLarge {
        /// The declared length.
        len: u64,
        /// The maximum accepted length.
        max: u64,
    },
}

/// Errors raised on the operator side while producing a signed alert.
#[derive(Debug, Error)]
pub enum SignError {
    /// The private key material is malformed.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// The underlying signature primitive failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The encoded payload exceeds what peers accept.
    #[error("payload of {len} bytes exceeds limit {max}")]
    PayloadTooLarge {
        /// Encoded payload length.
        len: usize,
        /// The maximum accepted length.
        max: u64,
    },

    /// The signed alert did not survive the pre-broadcast round trip.
    #[error("self-check failed: {0}")]
    SelfCheckFailed(String),
}

/// Errors raised while parsing public key configuration.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key text was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Bytes are not a valid SEC1 secp256k1 point.
    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Errors reported by the transport when sending to a peer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is no longer connected.
    #[error("peer {0} disconnected")]
    Disconnected(PeerHandle),

    /// Any other send failure.
    #[error("send failed: {0}")]
    Send(String),
}

/// Umbrella error for alert operations.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Wire decoding failed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Signing failed.
    #[error("sign error: {0}")]
    Sign(#[from] SignError),

    /// Key configuration was invalid.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
