//! Product metadata and the on-disk record encoding.
//!
//! Grounded on the "XDR-equivalent metadata encoding" convention: each
//! committed record is a `bincode`-encoded [`RecordHeader`] followed by
//! the raw product bytes, guarded by a `crc32fast` checksum so a torn or
//! corrupted write surfaces as [`crate::Error::Corrupt`] rather than
//! silently decoding garbage.

use serde::{Deserialize, Serialize};

use crate::sigindex::Signature;

/// Maximum length, in bytes, of the `origin` and `ident` strings.
pub const MAX_STRING_LEN: usize = 255;

/// A single product to be inserted into the queue.
#[derive(Debug, Clone)]
pub struct Product {
    /// Producing host or process name, at most [`MAX_STRING_LEN`] bytes.
    pub origin: String,
    /// Numeric feed classification, used for `class_filter` matching.
    pub feedtype: u32,
    /// Producer-assigned sequence number.
    pub seqno: u32,
    /// Arrival time as (seconds, microseconds) since the Unix epoch.
    pub arrival: (i64, u32),
    /// Product identifier string, at most [`MAX_STRING_LEN`] bytes.
    pub ident: String,
    /// Full content signature (e.g. an MD5 digest).
    pub signature: Signature,
    /// Opaque product payload.
    pub data: Vec<u8>,
}

impl Product {
    /// Validates string-length limits before encoding.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Inval`] if `origin` or `ident` exceeds
    /// [`MAX_STRING_LEN`] bytes.
    pub fn validate(&self) -> crate::Result<()> {
        if self.origin.len() > MAX_STRING_LEN {
            return Err(crate::Error::Inval(format!(
                "origin exceeds {MAX_STRING_LEN} bytes"
            )));
        }
        if self.ident.len() > MAX_STRING_LEN {
            return Err(crate::Error::Inval(format!(
                "ident exceeds {MAX_STRING_LEN} bytes"
            )));
        }
        Ok(())
    }
}

/// The fixed metadata fields persisted alongside a product's bytes,
/// everything a consumer needs without touching the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordHeader {
    /// See [`Product::origin`].
    pub origin: String,
    /// See [`Product::feedtype`].
    pub feedtype: u32,
    /// See [`Product::seqno`].
    pub seqno: u32,
    /// See [`Product::arrival`].
    pub arrival: (i64, u32),
    /// See [`Product::ident`].
    pub ident: String,
    /// See [`Product::signature`].
    pub signature: Signature,
    /// Length in bytes of the payload that follows the header.
    pub data_len: u32,
}

/// Metadata handed to a `sequence` callback: the header plus the region
/// it decoded from, without re-copying the payload bytes.
#[derive(Debug, Clone)]
pub struct ProductMetadata {
    /// The decoded fixed fields.
    pub header: RecordHeader,
    /// Insertion-time key assigned by the time index.
    pub time_key: u64,
    /// Byte offset into the data area of the region holding this
    /// product, the same value [`crate::Queue::release`] expects after a
    /// `sequence_lock` hold.
    pub offset: u64,
}

/// Encodes `header` followed by `payload` into a self-checksummed byte
/// buffer suitable for writing into a region.
///
/// # Errors
///
/// Returns [`crate::Error::System`] if `bincode` encoding fails (e.g. an
/// unrepresentable value), which should not happen for well-formed input.
pub fn encode(header: &RecordHeader, payload: &[u8]) -> crate::Result<Vec<u8>> {
    let header_bytes =
        bincode::serialize(header).map_err(|e| crate::Error::System(format!("header encode failed: {e}")))?;
    let header_len = header_bytes.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_bytes.len() + payload.len() + 4);
    buf.extend_from_slice(&header_len.to_le_bytes());
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(payload);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf);
    let checksum = hasher.finalize();
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

/// Computes the exact encoded length of `header` plus `payload_len` bytes
/// of payload, for sizing a reservation before encoding actually happens.
///
/// # Errors
///
/// Returns [`crate::Error::System`] on encoding failure, matching
/// [`encode`].
pub fn encoded_len(header: &RecordHeader, payload_len: usize) -> crate::Result<u64> {
    let header_len = bincode::serialized_size(header)
        .map_err(|e| crate::Error::System(format!("header size probe failed: {e}")))?;
    Ok(4 + header_len + payload_len as u64 + 4)
}

/// Decodes a record previously produced by [`encode`], verifying the
/// trailing checksum first.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if the buffer is too short, the
/// checksum does not match, or the header fails to decode.
pub fn decode(buf: &[u8]) -> crate::Result<(RecordHeader, &[u8])> {
    if buf.len() < 8 {
        return Err(crate::Error::Corrupt("record shorter than minimum framing".into()));
    }
    let (body, checksum_bytes) = buf.split_at(buf.len() - 4);
    let expected = u32::from_le_bytes(checksum_bytes.try_into().expect("4 bytes"));
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    if hasher.finalize() != expected {
        return Err(crate::Error::Corrupt("record checksum mismatch".into()));
    }

    let header_len = u32::from_le_bytes(body[0..4].try_into().expect("4 bytes")) as usize;
    if body.len() < 4 + header_len {
        return Err(crate::Error::Corrupt("record header length exceeds buffer".into()));
    }
    let header: RecordHeader = bincode::deserialize(&body[4..4 + header_len])
        .map_err(|e| crate::Error::Corrupt(format!("header decode failed: {e}")))?;
    let payload = &body[4 + header_len..];
    if payload.len() as u32 != header.data_len {
        return Err(crate::Error::Corrupt("payload length does not match header".into()));
    }
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(data_len: u32) -> RecordHeader {
        RecordHeader {
            origin: "h".into(),
            feedtype: 1,
            seqno: 0,
            arrival: (100, 0),
            ident: "i".into(),
            signature: [1; 16],
            data_len,
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let header = sample_header(16);
        let payload: Vec<u8> = (0..16).collect();
        let buf = encode(&header, &payload).unwrap();
        let (decoded_header, decoded_payload) = decode(&buf).unwrap();
        assert_eq!(decoded_header.seqno, header.seqno);
        assert_eq!(decoded_header.signature, header.signature);
        assert_eq!(decoded_payload, payload.as_slice());
    }

    #[test]
    fn corrupted_checksum_is_detected() {
        let header = sample_header(4);
        let mut buf = encode(&header, &[0, 1, 2, 3]).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(matches!(decode(&buf), Err(crate::Error::Corrupt(_))));
    }

    #[test]
    fn validate_rejects_oversize_strings() {
        let mut product = Product {
            origin: "h".into(),
            feedtype: 0,
            seqno: 0,
            arrival: (0, 0),
            ident: "a".repeat(MAX_STRING_LEN + 1),
            signature: [0; 16],
            data: vec![],
        };
        assert!(product.validate().is_err());
        product.ident = "short".into();
        assert!(product.validate().is_ok());
    }

    #[test]
    fn encoded_len_matches_actual_encode_length() {
        let header = sample_header(10);
        let payload = vec![0u8; 10];
        let predicted = encoded_len(&header, payload.len()).unwrap();
        let actual = encode(&header, &payload).unwrap();
        assert_eq!(predicted, actual.len() as u64);
    }
}
