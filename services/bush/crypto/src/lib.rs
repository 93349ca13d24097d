//! Primitive crypto adapter for the bush transport.
//!
//! Everything the packet family and the fragmentation engine need from
//! elliptic-curve cryptography lives here:
//!
//! - **Identities**: secp256k1 key pairs with 65-byte uncompressed public keys
//! - **Account addresses**: rightmost 20 bytes of the Keccak-256 hash of a public key
//! - **Signatures**: 65-byte recoverable `r ‖ s ‖ v` signatures over personal messages
//! - **ECIES**: public-key encryption used for every header fragment
//! - **Stream encryption**: size-preserving AES-256-CTR used for symmetric bodies
//! - **Session signing**: the async [`SessionSigner`] seam used while building packets

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod ecies;
pub mod error;
pub mod keys;
pub mod signature;
pub mod signer;
pub mod stream;

use sha3::{Digest, Keccak256};

pub use address::{Address, ADDRESS_SIZE};
pub use ecies::{ECIES_BLOCK_SIZE, ECIES_OVERHEAD};
pub use error::CryptoError;
pub use keys::{KeyPair, PublicKey, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
pub use signature::{recover, verify, Signature, SIGNATURE_SIZE};
pub use signer::SessionSigner;
pub use stream::{SymmetricKey, SYMMETRIC_KEY_SIZE};

/// Keccak-256 digest size in bytes
pub const HASH_SIZE: usize = 32;

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> [u8; HASH_SIZE] {
    Keccak256::digest(data).into()
}
