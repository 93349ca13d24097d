//! Fragment micro-header and correlation ids.
//!
//! ```text
//! +-----------+-------------------+-----------+----------+-----------------+
//! | scheme(1) | correlation id(8) | index u32 | size u16 | payload (size)  |
//! +-----------+-------------------+-----------+----------+-----------------+
//! ```
//!
//! Index 0 is the EC-encrypted header; indices from 1 carry body ciphertext
//! chunks in order. The header fragment travels under a provisional id (the
//! big-endian timestamp) while body fragments carry the canonical id,
//! `keccak256(timestamp ‖ master_address)[..8]`. The two only meet once the
//! header has been decrypted.

use crate::error::ReassemblyError;
use crate::scheme::EncryptionScheme;
use bush_crypto::{keccak256, Address};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Micro-header size in bytes
pub const MICRO_HEADER_SIZE: usize = 15;

/// Correlation id width
pub const CORRELATION_ID_SIZE: usize = 8;

/// Index of the header fragment
pub const HEADER_FRAGMENT_INDEX: u32 = 0;

/// Largest payload a single fragment can declare
pub const MAX_FRAGMENT_PAYLOAD: usize = u16::MAX as usize;

/// Reassembly key: scheme tag plus 8-byte id
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId {
    scheme: EncryptionScheme,
    id: [u8; CORRELATION_ID_SIZE],
}

impl CorrelationId {
    /// Wrap a scheme and raw id
    pub const fn new(scheme: EncryptionScheme, id: [u8; CORRELATION_ID_SIZE]) -> Self {
        Self { scheme, id }
    }

    /// Id the header fragment travels under
    pub fn provisional(scheme: EncryptionScheme, timestamp: u64) -> Self {
        Self::new(scheme, timestamp.to_be_bytes())
    }

    /// Id shared by body fragments and, after decryption, the header
    pub fn canonical(scheme: EncryptionScheme, timestamp: u64, master_address: &Address) -> Self {
        let mut seed = [0u8; 8 + 20];
        seed[..8].copy_from_slice(&timestamp.to_be_bytes());
        seed[8..].copy_from_slice(master_address.as_bytes());
        let hash = keccak256(&seed);

        let mut id = [0u8; CORRELATION_ID_SIZE];
        id.copy_from_slice(&hash[..CORRELATION_ID_SIZE]);
        Self::new(scheme, id)
    }

    /// Body scheme
    pub fn scheme(&self) -> EncryptionScheme {
        self.scheme
    }

    /// Raw 8-byte id
    pub fn id(&self) -> &[u8; CORRELATION_ID_SIZE] {
        &self.id
    }

    /// Hex of the scheme tag followed by the id
    pub fn to_hex(&self) -> String {
        let mut raw = [0u8; 1 + CORRELATION_ID_SIZE];
        raw[0] = self.scheme as u8;
        raw[1..].copy_from_slice(&self.id);
        hex::encode(raw)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({})", self.to_hex())
    }
}

/// One wire fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Scheme and id the fragment is filed under
    pub correlation: CorrelationId,
    /// 0 for the header, 1.. for body chunks
    pub index: u32,
    /// Encrypted header or body chunk
    pub payload: Bytes,
}

impl Fragment {
    /// Whether this is the header fragment
    pub fn is_header(&self) -> bool {
        self.index == HEADER_FRAGMENT_INDEX
    }

    /// Encoded size
    pub fn encoded_len(&self) -> usize {
        MICRO_HEADER_SIZE + self.payload.len()
    }

    /// Serialize with its micro-header. Payloads are capped at
    /// [`MAX_FRAGMENT_PAYLOAD`] by the fragmenter.
    pub fn encode(&self) -> Bytes {
        debug_assert!(self.payload.len() <= MAX_FRAGMENT_PAYLOAD);

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.correlation.scheme as u8);
        buf.put_slice(&self.correlation.id);
        buf.put_u32(self.index);
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a received fragment. Bytes past the declared payload size are
    /// ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, ReassemblyError> {
        if bytes.len() < MICRO_HEADER_SIZE {
            return Err(ReassemblyError::ShortFragment(bytes.len()));
        }

        let mut buf = bytes;
        let scheme = EncryptionScheme::try_from(buf.get_u8())?;
        let mut id = [0u8; CORRELATION_ID_SIZE];
        buf.copy_to_slice(&mut id);
        let index = buf.get_u32();
        let size = buf.get_u16() as usize;

        if buf.remaining() < size {
            return Err(ReassemblyError::PayloadTruncated {
                declared: size,
                available: buf.remaining(),
            });
        }

        Ok(Self {
            correlation: CorrelationId::new(scheme, id),
            index,
            payload: Bytes::copy_from_slice(&buf[..size]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Fragment {
        Fragment {
            correlation: CorrelationId::new(EncryptionScheme::Ec, [1, 2, 3, 4, 5, 6, 7, 8]),
            index: 3,
            payload: Bytes::from_static(b"chunk"),
        }
    }

    #[test]
    fn test_micro_header_layout() {
        let encoded = sample().encode();
        assert_eq!(encoded.len(), MICRO_HEADER_SIZE + 5);
        assert_eq!(encoded[0], 1);
        assert_eq!(&encoded[1..9], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&encoded[9..13], &3u32.to_be_bytes());
        assert_eq!(&encoded[13..15], &5u16.to_be_bytes());
        assert_eq!(&encoded[15..], b"chunk");

        assert_eq!(Fragment::decode(&encoded).unwrap(), sample());
    }

    #[test]
    fn test_short_fragment() {
        assert_eq!(
            Fragment::decode(&[0u8; 14]).unwrap_err(),
            ReassemblyError::ShortFragment(14)
        );
    }

    #[test]
    fn test_declared_size_beyond_payload() {
        let encoded = sample().encode();
        assert_eq!(
            Fragment::decode(&encoded[..encoded.len() - 1]).unwrap_err(),
            ReassemblyError::PayloadTruncated {
                declared: 5,
                available: 4
            }
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut encoded = sample().encode().to_vec();
        encoded.extend_from_slice(b"garbage");
        assert_eq!(Fragment::decode(&encoded).unwrap(), sample());
    }

    #[test]
    fn test_unknown_scheme() {
        let mut encoded = sample().encode().to_vec();
        encoded[0] = 9;
        assert_eq!(
            Fragment::decode(&encoded).unwrap_err(),
            ReassemblyError::UnknownScheme(9)
        );
    }

    #[test]
    fn test_ids_differ_between_header_and_body() {
        let master: Address = "889716f93bcf0ce09ef4e57498e94fd0b84fdad4".parse().unwrap();
        let provisional = CorrelationId::provisional(EncryptionScheme::Ec, 42);
        let canonical = CorrelationId::canonical(EncryptionScheme::Ec, 42, &master);

        assert_eq!(provisional.id(), &42u64.to_be_bytes());
        assert_ne!(provisional, canonical);
        assert_eq!(
            canonical,
            CorrelationId::canonical(EncryptionScheme::Ec, 42, &master)
        );
        assert_ne!(
            canonical,
            CorrelationId::canonical(EncryptionScheme::None, 42, &master)
        );
        assert_eq!(canonical.to_hex().len(), 18);
        assert!(canonical.to_hex().starts_with("01"));
    }
}
