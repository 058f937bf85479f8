//! Operator-side alert signing.

use k256::ecdsa::Signature;
use k256::ecdsa::signature::hazmat::PrehashSigner;

use crate::codec;
use crate::error::SignError;
use crate::keys::AlertSigningKey;
use crate::types::{SignedAlert, UnsignedAlert};

/// Signs an alert with the operator key.
///
/// The payload is encoded once and those exact bytes are kept as the signed
/// alert's `raw_payload`. The signature is a low-S, DER-encoded ECDSA
/// signature over the double-SHA-256 of the payload.
///
/// # Errors
///
/// Returns `SignError::PayloadTooLarge` if the encoded payload exceeds
/// [`codec::MAX_PAYLOAD_SIZE`], or `SignError::SigningFailed` if the signature
/// primitive fails.
pub fn sign(unsigned: UnsignedAlert, key: &AlertSigningKey) -> Result<SignedAlert, SignError> {
    let raw_payload = codec::encode(&unsigned);
    if raw_payload.len() as u64 > codec::MAX_PAYLOAD_SIZE {
        return Err(SignError::PayloadTooLarge {
            len: raw_payload.len(),
            max: codec::MAX_PAYLOAD_SIZE,
        });
    }
    let digest = codec::hash256(&raw_payload);

    let signature: Signature = key
        .inner()
        .sign_prehash(&digest)
        .map_err(|e| SignError::SigningFailed(e.to_string()))?;
    let signature = signature.normalize_s().unwrap_or(signature);

    Ok(SignedAlert::assemble(
        unsigned,
        raw_payload,
        signature.to_der().as_bytes().to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn sample() -> UnsignedAlert {
        UnsignedAlert {
            id: 7,
            relay_until: Timestamp::from_unix(100),
            expiration: Timestamp::from_unix(200),
            status_text: "test".to_string(),
            ..UnsignedAlert::default()
        }
    }

    /// Builds an alert whose encoding is exactly `len` bytes (`len` >= 256).
    fn with_payload_len(len: usize) -> UnsignedAlert {
        let empty = codec::encode(&sample()).len() - sample().status_text.len();
        UnsignedAlert {
            status_text: "x".repeat(len - empty - 2),
            ..sample()
        }
    }

    #[test]
    fn keeps_encoded_payload() {
        let key = AlertSigningKey::from(SigningKey::random(&mut OsRng));
        let signed = sign(sample(), &key).unwrap();
        assert_eq!(signed.raw_payload(), codec::encode(&sample()).as_slice());
        assert_eq!(signed.alert(), &sample());
    }

    #[test]
    fn signature_is_der() {
        let key = AlertSigningKey::from(SigningKey::random(&mut OsRng));
        let signed = sign(sample(), &key).unwrap();
        assert_eq!(signed.signature()[0], 0x30);
        assert!(Signature::from_der(signed.signature()).is_ok());
    }

    #[test]
    fn signature_is_low_s() {
        let key = AlertSigningKey::from(SigningKey::random(&mut OsRng));
        for id in 0..16 {
            let alert = UnsignedAlert { id, ..sample() };
            let signed = sign(alert, &key).unwrap();
            let signature = Signature::from_der(signed.signature()).unwrap();
            assert!(signature.normalize_s().is_none());
        }
    }

    #[test]
    fn payload_at_limit_survives_the_wire() {
        let key = AlertSigningKey::from(SigningKey::random(&mut OsRng));
        let limit = codec::MAX_PAYLOAD_SIZE as usize;
        let signed = sign(with_payload_len(limit), &key).unwrap();
        assert_eq!(signed.raw_payload().len(), limit);

        let received = codec::decode_signed(&signed.to_wire()).unwrap();
        assert_eq!(received, signed);
    }

    #[test]
    fn payload_over_limit_is_refused() {
        let key = AlertSigningKey::from(SigningKey::random(&mut OsRng));
        let over = codec::MAX_PAYLOAD_SIZE as usize + 1;
        assert!(matches!(
            sign(with_payload_len(over), &key),
            Err(SignError::PayloadTooLarge { len, .. }) if len == over
        ));
    }

    #[test]
    fn signing_is_deterministic() {
        // RFC 6979 nonces make repeated signatures identical.
        let key = AlertSigningKey::from(SigningKey::random(&mut OsRng));
        let a = sign(sample(), &key).unwrap();
        let b = sign(sample(), &key).unwrap();
        assert_eq!(a, b);
    }
}
