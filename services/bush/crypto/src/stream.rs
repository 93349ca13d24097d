//! Size-preserving symmetric encryption for bodies.
//!
//! AES-256 in CTR mode with a fixed initial counter block of 5 (big
//! endian). Encryption and decryption are the same keystream XOR.

use crate::CryptoError;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use std::fmt;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Symmetric key size in bytes
pub const SYMMETRIC_KEY_SIZE: usize = 32;

const INITIAL_COUNTER: u128 = 5;

/// 32-byte AES-256 key
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    /// Wrap raw key bytes
    pub const fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a key, rejecting anything that is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SYMMETRIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::KeyLength {
                expected: SYMMETRIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }

    /// XOR `data` in place with the keystream
    pub fn apply_keystream(&self, data: &mut [u8]) {
        let mut cipher = Aes256Ctr::new(&self.0.into(), &INITIAL_COUNTER.to_be_bytes().into());
        cipher.apply_keystream(data);
    }

    /// Encrypt (or decrypt) into a new buffer
    pub fn transform(&self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply_keystream(&mut out);
        out
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}
