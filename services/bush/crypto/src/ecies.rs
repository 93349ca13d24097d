//! ECIES public-key encryption.
//!
//! Payload layout: `iv(16) ‖ ephemeral_public(65) ‖ mac(32) ‖ ciphertext`.
//!
//! An ephemeral secp256k1 key agrees a secret with the recipient. The
//! SHA-512 of the shared x-coordinate is split into an AES-256-CBC key
//! (first half) and an HMAC-SHA256 key (second half). The MAC covers
//! `iv ‖ ephemeral_public ‖ ciphertext`. Ciphertext is PKCS#7 padded, so
//! the total size is `113 + 16 * (n / 16 + 1)` for an `n`-byte message.

use crate::keys::{KeyPair, PublicKey, PUBLIC_KEY_SIZE};
use crate::CryptoError;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use k256::ecdh::EphemeralSecret;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use tracing::trace;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES block size; ciphertexts are padded to a multiple of this
pub const ECIES_BLOCK_SIZE: usize = 16;

const IV_SIZE: usize = 16;
const MAC_SIZE: usize = 32;

/// Fixed envelope size: iv + ephemeral public key + MAC
pub const ECIES_OVERHEAD: usize = IV_SIZE + PUBLIC_KEY_SIZE + MAC_SIZE;

struct DerivedKeys {
    encryption: [u8; 32],
    mac: [u8; 32],
}

fn derive(shared_x: &[u8]) -> DerivedKeys {
    let hash = Sha512::digest(shared_x);
    let mut encryption = [0u8; 32];
    let mut mac = [0u8; 32];
    encryption.copy_from_slice(&hash[..32]);
    mac.copy_from_slice(&hash[32..]);
    DerivedKeys { encryption, mac }
}

fn compute_mac(
    key: &[u8],
    iv: &[u8],
    ephemeral: &[u8],
    ciphertext: &[u8],
) -> Result<HmacSha256, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| CryptoError::Mac)?;
    mac.update(iv);
    mac.update(ephemeral);
    mac.update(ciphertext);
    Ok(mac)
}

/// Size of the ECIES payload produced for an `n`-byte message
pub fn encrypted_len(n: usize) -> usize {
    ECIES_OVERHEAD + (n / ECIES_BLOCK_SIZE + 1) * ECIES_BLOCK_SIZE
}

/// Encrypt `message` for the holder of `recipient`
pub fn encrypt(recipient: &PublicKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = PublicKey::from(ephemeral.public_key()).to_bytes();
    let shared = ephemeral.diffie_hellman(recipient.as_inner());
    let keys = derive(shared.raw_secret_bytes());

    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&keys.encryption.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(message);
    let tag = compute_mac(&keys.mac, &iv, &ephemeral_public, &ciphertext)?
        .finalize()
        .into_bytes();

    let mut out = Vec::with_capacity(ECIES_OVERHEAD + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ephemeral_public);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&ciphertext);
    trace!("ecies encrypted {} bytes into {}", message.len(), out.len());
    Ok(out)
}

/// Decrypt an ECIES payload addressed to `recipient`
pub fn decrypt(recipient: &KeyPair, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < ECIES_OVERHEAD + ECIES_BLOCK_SIZE {
        return Err(CryptoError::CiphertextTooShort(payload.len()));
    }

    let (iv, rest) = payload.split_at(IV_SIZE);
    let (ephemeral_bytes, rest) = rest.split_at(PUBLIC_KEY_SIZE);
    let (tag, ciphertext) = rest.split_at(MAC_SIZE);

    let ephemeral = PublicKey::from_slice(ephemeral_bytes).map_err(|_| CryptoError::Decrypt)?;
    let shared = k256::ecdh::diffie_hellman(
        recipient.secret().to_nonzero_scalar(),
        ephemeral.as_inner().as_affine(),
    );
    let keys = derive(shared.raw_secret_bytes());

    compute_mac(&keys.mac, iv, ephemeral_bytes, ciphertext)?
        .verify_slice(tag)
        .map_err(|_| CryptoError::Mac)?;

    let mut iv_block = [0u8; IV_SIZE];
    iv_block.copy_from_slice(iv);
    Aes256CbcDec::new(&keys.encryption.into(), &iv_block.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decrypt)
}
