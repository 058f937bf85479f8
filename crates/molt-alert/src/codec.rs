//! Canonical alert encoding.
//!
//! The payload encoding is the single byte form that gets signed, so it must
//! be deterministic: integers are fixed-width little endian, sets are written
//! in ascending order, and lengths use the minimal compact-size form. The
//! decoder enforces the same rules, so any accepted input re-encodes to the
//! identical bytes.
//!
//! Signed alerts travel as `varbytes(raw_payload) || varbytes(signature)`.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::error::DecodeError;
use crate::types::{SignedAlert, Timestamp, UnsignedAlert};

/// Upper bound on the encoded payload, in bytes.
///
/// Field lengths are only bounded by this total; [`crate::signer::sign`]
/// refuses to produce a payload the decoder would reject.
pub const MAX_PAYLOAD_SIZE: u64 = 64 * 1024;

/// Upper bound on a DER-encoded secp256k1 signature, in bytes.
pub const MAX_SIGNATURE_SIZE: u64 = 72;

/// Encodes the payload fields in canonical order.
#[must_use]
pub fn encode(alert: &UnsignedAlert) -> Vec<u8> {
    let mut buf = Vec::with_capacity(96 + alert.status_text.len() + alert.comment.len());
    buf.extend_from_slice(&alert.version.to_le_bytes());
    buf.extend_from_slice(&alert.relay_until.as_unix().to_le_bytes());
    buf.extend_from_slice(&alert.expiration.as_unix().to_le_bytes());
    buf.extend_from_slice(&alert.id.to_le_bytes());
    buf.extend_from_slice(&alert.cancel.to_le_bytes());
    write_compact_size(&mut buf, alert.cancel_set.len() as u64);
    for id in &alert.cancel_set {
        buf.extend_from_slice(&id.to_le_bytes());
    }
    buf.extend_from_slice(&alert.min_version.to_le_bytes());
    buf.extend_from_slice(&alert.max_version.to_le_bytes());
    write_compact_size(&mut buf, alert.sub_versions.len() as u64);
    for sub_version in &alert.sub_versions {
        write_bytes(&mut buf, sub_version.as_bytes());
    }
    buf.extend_from_slice(&alert.priority.to_le_bytes());
    write_bytes(&mut buf, alert.comment.as_bytes());
    write_bytes(&mut buf, alert.status_text.as_bytes());
    write_bytes(&mut buf, alert.reserved.as_bytes());
    buf
}

/// Decodes a canonical payload.
///
/// # Errors
///
/// Returns a [`DecodeError`] on oversized or truncated input, trailing bytes,
/// invalid UTF-8, non-canonical lengths or unsorted sets.
pub fn decode(bytes: &[u8]) -> Result<UnsignedAlert, DecodeError> {
    check_len(bytes.len(), MAX_PAYLOAD_SIZE)?;
    let mut reader = Reader::new(bytes);

    let version = reader.read_i32()?;
    let relay_until = Timestamp::from_unix(reader.read_i64()?);
    let expiration = Timestamp::from_unix(reader.read_i64()?);
    let id = reader.read_i64()?;
    let cancel = reader.read_i64()?;

    let count = reader.read_compact_size()?;
    let mut cancel_set = BTreeSet::new();
    let mut last = None;
    for _ in 0..count {
        let value = reader.read_i64()?;
        if last.is_some_and(|prev| value <= prev) {
            return Err(DecodeError::UnsortedSet);
        }
        last = Some(value);
        cancel_set.insert(value);
    }

    let min_version = reader.read_i32()?;
    let max_version = reader.read_i32()?;

    let count = reader.read_compact_size()?;
    let mut sub_versions = BTreeSet::new();
    let mut last: Option<String> = None;
    for _ in 0..count {
        let value = reader.read_string()?;
        if last.as_ref().is_some_and(|prev| value <= *prev) {
            return Err(DecodeError::UnsortedSet);
        }
        last = Some(value.clone());
        sub_versions.insert(value);
    }

    let priority = reader.read_i32()?;
    let comment = reader.read_string()?;
    let status_text = reader.read_string()?;
    let reserved = reader.read_string()?;
    reader.finish()?;

    Ok(UnsignedAlert {
        version,
        relay_until,
        expiration,
        id,
        cancel,
        cancel_set,
        min_version,
        max_version,
        sub_versions,
        priority,
        comment,
        status_text,
        reserved,
    })
}

/// Encodes a signed alert for the wire.
#[must_use]
pub fn encode_signed(signed: &SignedAlert) -> Vec<u8> {
    let mut buf = Vec::with_capacity(signed.raw_payload().len() + signed.signature().len() + 6);
    write_bytes(&mut buf, signed.raw_payload());
    write_bytes(&mut buf, signed.signature());
    buf
}

/// Decodes a signed alert from the wire, keeping the signed bytes verbatim.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the framing or the embedded payload is malformed.
pub fn decode_signed(bytes: &[u8]) -> Result<SignedAlert, DecodeError> {
    let mut reader = Reader::new(bytes);
    let raw_payload = reader.read_bytes()?.to_vec();
    let signature = reader.read_bytes()?.to_vec();
    reader.finish()?;
    check_len(signature.len(), MAX_SIGNATURE_SIZE)?;
    SignedAlert::from_parts(raw_payload, signature)
}

/// Double SHA-256, the digest alerts are signed and identified by.
#[must_use]
pub fn hash256(bytes: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(bytes);
    Sha256::digest(first).into()
}

fn check_len(len: usize, max: u64) -> Result<(), DecodeError> {
    let len = len as u64;
    if len > max {
        return Err(DecodeError::TooLarge { len, max });
    }
    Ok(())
}

fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        buf.push(n as u8);
    } else if n <= u64::from(u16::MAX) {
        buf.push(0xfd);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= u64::from(u32::MAX) {
        buf.push(0xfe);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Cursor over an input slice.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.bytes.len() - self.pos;
        if len > remaining {
            return Err(DecodeError::Truncated {
                needed: len - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    fn read_compact_size(&mut self) -> Result<u64, DecodeError> {
        let (value, min) = match self.read_u8()? {
            0xfd => (u64::from(u16::from_le_bytes(self.take_array()?)), 0xfd),
            0xfe => (u64::from(u32::from_le_bytes(self.take_array()?)), 0x1_0000),
            0xff => (u64::from_le_bytes(self.take_array()?), 0x1_0000_0000),
            small => return Ok(u64::from(small)),
        };
        if value < min {
            return Err(DecodeError::NonCanonicalSize);
        }
        Ok(value)
    }

    fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_compact_size()?;
        self.take(usize::try_from(len).unwrap_or(usize::MAX))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    fn finish(self) -> Result<(), DecodeError> {
        let count = self.bytes.len() - self.pos;
        if count == 0 {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes { count })
        }
    }
}
