//! Body encryption schemes and sizing estimates.

use crate::error::{CapacityError, ReassemblyError};
use bush_crypto::{
    ecies, KeyPair, PublicKey, SymmetricKey, ECIES_BLOCK_SIZE, PUBLIC_KEY_SIZE,
    SYMMETRIC_KEY_SIZE,
};
use std::fmt;

/// How a packet body is encrypted. Headers are always EC-encrypted.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionScheme {
    /// AES-256-CTR with a shared 32-byte key; size-preserving
    Symmetric = 0,
    /// ECIES to the recipient's public key; pads to the block size
    Ec = 1,
    /// No encryption
    None = 2,
}

impl EncryptionScheme {
    /// Size of `plain_size` bytes once encrypted with this scheme.
    /// EC rounds up to the next block boundary, adding a full block when
    /// already aligned; the other schemes preserve size.
    pub fn estimate_encrypted_size(self, plain_size: usize) -> usize {
        match self {
            EncryptionScheme::Ec => {
                plain_size + (ECIES_BLOCK_SIZE - plain_size % ECIES_BLOCK_SIZE)
            }
            EncryptionScheme::Symmetric | EncryptionScheme::None => plain_size,
        }
    }

    /// Number of `fragment_size` pieces `data` needs once encrypted with
    /// this scheme. A zero fragment size is treated as 1.
    pub fn estimate_fragment_count(self, data: &[u8], fragment_size: usize) -> usize {
        self.estimate_encrypted_size(data.len())
            .div_ceil(fragment_size.max(1))
    }

    /// Check a body key against this scheme
    pub(crate) fn body_key(self, key: &[u8]) -> Result<BodyKey, CapacityError> {
        match self {
            EncryptionScheme::Ec => {
                self.expect_width(key, PUBLIC_KEY_SIZE)?;
                PublicKey::from_slice(key)
                    .map(BodyKey::Ec)
                    .map_err(|_| CapacityError::InvalidBodyKey(self))
            }
            EncryptionScheme::Symmetric => {
                self.expect_width(key, SYMMETRIC_KEY_SIZE)?;
                SymmetricKey::from_slice(key)
                    .map(BodyKey::Symmetric)
                    .map_err(|_| CapacityError::InvalidBodyKey(self))
            }
            EncryptionScheme::None => Ok(BodyKey::None),
        }
    }

    fn expect_width(self, key: &[u8], expected: usize) -> Result<(), CapacityError> {
        if key.len() != expected {
            return Err(CapacityError::BodyKeyLength {
                scheme: self,
                expected,
                actual: key.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<u8> for EncryptionScheme {
    type Error = ReassemblyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EncryptionScheme::Symmetric),
            1 => Ok(EncryptionScheme::Ec),
            2 => Ok(EncryptionScheme::None),
            _ => Err(ReassemblyError::UnknownScheme(value)),
        }
    }
}

impl fmt::Display for EncryptionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionScheme::Symmetric => f.write_str("symmetric"),
            EncryptionScheme::Ec => f.write_str("ec"),
            EncryptionScheme::None => f.write_str("none"),
        }
    }
}

/// A validated body encryption key
pub(crate) enum BodyKey {
    Ec(PublicKey),
    Symmetric(SymmetricKey),
    None,
}

impl BodyKey {
    pub(crate) fn encrypt(&self, body: &[u8]) -> Result<Vec<u8>, bush_crypto::CryptoError> {
        match self {
            BodyKey::Ec(key) => ecies::encrypt(key, body),
            BodyKey::Symmetric(key) => Ok(key.transform(body)),
            BodyKey::None => Ok(body.to_vec()),
        }
    }
}

/// Key material for decrypting a reassembled body
pub(crate) enum BodyOpener<'a> {
    /// EC bodies are addressed to the header key pair
    Ec(&'a KeyPair),
    Symmetric(SymmetricKey),
    None,
}

impl BodyOpener<'_> {
    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ReassemblyError> {
        match self {
            BodyOpener::Ec(key) => {
                ecies::decrypt(key, ciphertext).map_err(ReassemblyError::BodyDecrypt)
            }
            BodyOpener::Symmetric(key) => Ok(key.transform(ciphertext)),
            BodyOpener::None => Ok(ciphertext.to_vec()),
        }
    }
}
