//! Crypto adapter error types.

use thiserror::Error;

/// Crypto adapter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    KeyLength {
        /// Required length in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Bytes do not encode a valid secp256k1 key
    #[error("invalid {0} key")]
    InvalidKey(&'static str),

    /// Address is not a 20-byte account address
    #[error("invalid address: expected 20 bytes, got {0}")]
    InvalidAddress(usize),

    /// Signature is not 65 bytes
    #[error("invalid signature length: expected 65, got {0}")]
    SignatureLength(usize),

    /// Hex text could not be decoded
    #[error("invalid hex encoding")]
    Hex,

    /// Signing primitive failed
    #[error("signing failed")]
    Sign,

    /// Signer could not be recovered from a signature
    #[error("signature recovery failed")]
    Recover,

    /// ECIES payload shorter than its fixed envelope
    #[error("ciphertext too short: {0} bytes")]
    CiphertextTooShort(usize),

    /// ECIES MAC did not match
    #[error("ciphertext authentication failed")]
    Mac,

    /// Block padding or key agreement failure during decryption
    #[error("decryption failed")]
    Decrypt,
}
