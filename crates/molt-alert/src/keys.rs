//! Alert key material and network selection.
//!
//! Alerts are signed with ECDSA over secp256k1. Mainnet and testnet each have
//! their own alert public key; a node resolves the key for its configured
//! [`Network`] once and hands the resulting [`AlertPublicKey`] to the verifier.

use std::fmt;

use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};

use crate::error::{KeyError, SignError};

/// The network an alert key belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Main,
    /// Test network.
    Test,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Test => write!(f, "test"),
        }
    }
}

const SECRET_KEY_LEN: usize = 32;

/// Operator private key used to sign alerts.
#[derive(Clone)]
pub struct AlertSigningKey(SigningKey);

impl AlertSigningKey {
    /// Parses a raw 32-byte secret scalar.
    ///
    /// # Errors
    ///
    /// Returns `SignError::InvalidKey` if the bytes are not a valid non-zero scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(SignError::InvalidKey(format!(
                "expected {SECRET_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| SignError::InvalidKey(e.to_string()))
    }

    /// Parses a hex-encoded 32-byte secret scalar.
    ///
    /// # Errors
    ///
    /// Returns `SignError::InvalidKey` if the text is not hex or not a valid scalar.
    pub fn from_hex(text: &str) -> Result<Self, SignError> {
        let bytes = hex::decode(text.trim()).map_err(|e| SignError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn public_key(&self) -> AlertPublicKey {
        AlertPublicKey(*self.0.verifying_key())
    }

    pub(crate) const fn inner(&self) -> &SigningKey {
        &self.0
    }
}

impl From<SigningKey> for AlertSigningKey {
    fn from(key: SigningKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for AlertSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertSigningKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Network alert public key used by peers to verify alerts.
#[derive(Clone, PartialEq, Eq)]
pub struct AlertPublicKey(VerifyingKey);

impl AlertPublicKey {
    /// Parses a SEC1 encoded point (33-byte compressed or 65-byte uncompressed).
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidPublicKey` if the bytes are not a curve point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    /// Parses a hex-encoded SEC1 point.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the text is not hex or not a curve point.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(text.trim())?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Returns the uncompressed SEC1 encoding.
    #[must_use]
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Returns the uncompressed SEC1 encoding as hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_sec1_bytes())
    }

    pub(crate) const fn inner(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for AlertPublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for AlertPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlertPublicKey({})", self.to_hex())
    }
}

/// The alert public keys of both networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkKeys {
    main: AlertPublicKey,
    test: AlertPublicKey,
}

impl NetworkKeys {
    /// Creates the key pair table.
    #[must_use]
    pub const fn new(main: AlertPublicKey, test: AlertPublicKey) -> Self {
        Self { main, test }
    }

    /// Returns the key for `network`.
    #[must_use]
    pub const fn select(&self, network: Network) -> &AlertPublicKey {
        match network {
            Network::Main => &self.main,
            Network::Test => &self.test,
        }
    }
}
