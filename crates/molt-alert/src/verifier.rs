//! Peer-side alert verification.
//!
//! Verification never fails loudly: malformed signatures, a key from the
//! wrong network and tampered payloads all simply yield `false`.

use k256::ecdsa::Signature;
use k256::ecdsa::signature::hazmat::PrehashVerifier;

use crate::codec;
use crate::keys::AlertPublicKey;
use crate::types::SignedAlert;

/// Checks the alert's signature over its verbatim `raw_payload`.
#[must_use]
pub fn verify(signed: &SignedAlert, network_key: &AlertPublicKey) -> bool {
    verify_payload(signed.raw_payload(), signed.signature(), network_key)
}

/// Checks a DER signature over payload bytes.
#[must_use]
pub fn verify_payload(raw_payload: &[u8], signature: &[u8], network_key: &AlertPublicKey) -> bool {
    let Ok(signature) = Signature::from_der(signature) else {
        return false;
    };
    let digest = codec::hash256(raw_payload);
    network_key.inner().verify_prehash(&digest, &signature).is_ok()
}
