//! Recoverable 65-byte signatures over personal messages.
//!
//! A message is signed as a personal message over its lowercase hex text:
//! the signed digest is
//! `keccak256("\x19Ethereum Signed Message:\n" ‖ len(hex) ‖ hex)`.
//! Signatures are `r ‖ s ‖ v` with `v = 27 + recovery_id`, and verification
//! recovers the signer's address rather than taking a public key.

use crate::address::Address;
use crate::keys::PublicKey;
use crate::CryptoError;
use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Signature size in bytes
pub const SIGNATURE_SIZE: usize = 65;

const PERSONAL_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";
const V_OFFSET: u8 = 27;

/// 65-byte recoverable signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// Wrap raw signature bytes
    pub const fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a signature, rejecting anything that is not exactly 65 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SIGNATURE_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::SignatureLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// Raw signature bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

fn personal_digest(message: &[u8]) -> Keccak256 {
    let text = hex::encode(message);
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_PREFIX);
    hasher.update(text.len().to_string().as_bytes());
    hasher.update(text.as_bytes());
    hasher
}

pub(crate) fn sign(key: &SigningKey, message: &[u8]) -> Result<Signature, CryptoError> {
    let (signature, recovery_id) = key
        .sign_digest_recoverable(personal_digest(message))
        .map_err(|_| CryptoError::Sign)?;

    let mut out = [0u8; SIGNATURE_SIZE];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = V_OFFSET + recovery_id.to_byte();
    Ok(Signature(out))
}

/// Recover the address that produced `signature` over `message`
pub fn recover(message: &[u8], signature: &Signature) -> Result<Address, CryptoError> {
    let v = signature.0[64];
    let recovery_byte = match v {
        0 | 1 => v,
        27 | 28 => v - V_OFFSET,
        _ => return Err(CryptoError::Recover),
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or(CryptoError::Recover)?;
    let inner = k256::ecdsa::Signature::from_slice(&signature.0[..64])
        .map_err(|_| CryptoError::Recover)?;

    let key = VerifyingKey::recover_from_digest(personal_digest(message), &inner, recovery_id)
        .map_err(|_| CryptoError::Recover)?;
    Ok(PublicKey::from(k256::PublicKey::from(&key)).address())
}

/// Whether `signature` over `message` was produced by the owner of `address`.
/// Malformed signatures verify as false.
pub fn verify(message: &[u8], signature: &Signature, address: &Address) -> bool {
    matches!(recover(message, signature), Ok(signer) if signer == *address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn test_sign_verify() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"Testing ... ").unwrap();

        assert_eq!(signature.as_bytes().len(), SIGNATURE_SIZE);
        assert!(matches!(signature.as_bytes()[64], 27 | 28));
        assert!(verify(b"Testing ... ", &signature, &keypair.address()));
    }

    #[test]
    fn test_verify_wrong_message() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"Testing ... ").unwrap();
        assert!(!verify(b"Testing ... ... ", &signature, &keypair.address()));
    }

    #[test]
    fn test_verify_wrong_signer() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"Testing ... ").unwrap();
        let other: Address = "4bC0898D2c2c0Fe9929C42814F5B128062a35D25".parse().unwrap();
        assert!(!verify(b"Testing ... ", &signature, &other));
    }

    #[test]
    fn test_signature_length_checked() {
        assert_eq!(
            Signature::from_slice(&[0xee, 0xff]).unwrap_err(),
            CryptoError::SignatureLength(2)
        );
    }

    #[test]
    fn test_garbage_signature_is_rejected() {
        let keypair = KeyPair::generate();
        let garbage = Signature::from_bytes([0xAB; SIGNATURE_SIZE]);
        assert!(!verify(b"message", &garbage, &keypair.address()));
    }

    #[test]
    fn test_endorse() {
        let master = KeyPair::generate();
        let session = KeyPair::generate();
        let endorsement = master.endorse(session.public_key()).unwrap();
        assert!(verify(
            session.address().as_bytes(),
            &endorsement,
            &master.address()
        ));
    }
}
