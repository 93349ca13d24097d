//! secp256k1 key pairs and public keys.

use crate::address::Address;
use crate::signature::{self, Signature};
use crate::CryptoError;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use std::fmt;

/// Uncompressed public key size in bytes (0x04 tag + two 32-byte coordinates)
pub const PUBLIC_KEY_SIZE: usize = 65;

/// Private key size in bytes
pub const SECRET_KEY_SIZE: usize = 32;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// secp256k1 public key, always serialized uncompressed (65 bytes)
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Parse a 65-byte uncompressed public key
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::KeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0] != UNCOMPRESSED_TAG {
            return Err(CryptoError::InvalidKey("public"));
        }
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKey("public"))
    }

    /// Uncompressed SEC1 encoding
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Address owned by this key
    pub fn address(&self) -> Address {
        Address::from_public_key(self)
    }

    pub(crate) fn as_inner(&self) -> &k256::PublicKey {
        &self.0
    }
}

impl From<k256::PublicKey> for PublicKey {
    fn from(key: k256::PublicKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

/// secp256k1 key pair used both as a long-lived master identity and as a
/// short-lived session key.
#[derive(Clone)]
pub struct KeyPair {
    secret: k256::SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair using the OS CSPRNG
    pub fn generate() -> Self {
        Self::from_secret(k256::SecretKey::random(&mut OsRng))
    }

    /// Restore a key pair from its 32-byte private key
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::KeyLength {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let secret =
            k256::SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidKey("private"))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: k256::SecretKey) -> Self {
        let public = PublicKey(secret.public_key());
        Self { secret, public }
    }

    /// Raw private key bytes
    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.secret.to_bytes().into()
    }

    /// Public half of the pair
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Address owned by this key pair
    pub fn address(&self) -> Address {
        self.public.address()
    }

    /// Sign `message` as a personal message
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        signature::sign(&SigningKey::from(&self.secret), message)
    }

    /// Produce the master signature vouching for a session key: a signature
    /// over the session key's address bytes.
    pub fn endorse(&self, session_key: &PublicKey) -> Result<Signature, CryptoError> {
        self.sign(session_key.address().as_bytes())
    }

    pub(crate) fn secret(&self) -> &k256::SecretKey {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
