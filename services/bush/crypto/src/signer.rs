//! Session signing seam.
//!
//! Packet construction signs through this trait so that the session key can
//! live behind an async boundary (a wallet, an HSM, a remote signer).

use crate::keys::{KeyPair, PublicKey};
use crate::signature::Signature;
use crate::CryptoError;
use async_trait::async_trait;

/// Produces session signatures for outgoing packets
#[async_trait]
pub trait SessionSigner: Send + Sync {
    /// Public key of the session being signed for
    fn public_key(&self) -> PublicKey;

    /// Sign `message` as a personal message
    async fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError>;
}

#[async_trait]
impl SessionSigner for KeyPair {
    fn public_key(&self) -> PublicKey {
        KeyPair::public_key(self).clone()
    }

    async fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        KeyPair::sign(self, message)
    }
}
