//! 20-byte account addresses derived from public keys.

use crate::keys::PublicKey;
use crate::{keccak256, CryptoError};
use std::fmt;
use std::str::FromStr;

/// Account address size in bytes
pub const ADDRESS_SIZE: usize = 20;

/// Account-style address: the rightmost 20 bytes of the Keccak-256 hash
/// of the 64 coordinate bytes of an uncompressed public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Wrap raw address bytes
    pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse an address from a slice, rejecting anything that is not exactly 20 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ADDRESS_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidAddress(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// Derive the address owned by a public key
    pub fn from_public_key(key: &PublicKey) -> Self {
        let encoded = key.to_bytes();
        // Skip the 0x04 uncompressed-point tag
        let hash = keccak256(&encoded[1..]);
        let mut out = [0u8; ADDRESS_SIZE];
        out.copy_from_slice(&hash[hash.len() - ADDRESS_SIZE..]);
        Self(out)
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| CryptoError::Hex)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn test_address_from_slice_length() {
        assert!(Address::from_slice(&[0u8; 20]).is_ok());
        assert_eq!(
            Address::from_slice(&[0u8; 19]).unwrap_err(),
            CryptoError::InvalidAddress(19)
        );
        assert_eq!(
            Address::from_slice(&[0u8; 21]).unwrap_err(),
            CryptoError::InvalidAddress(21)
        );
    }

    #[test]
    fn test_address_known_vector() {
        // Private key 0x...01 owns the well-known generator-point address
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let keypair = KeyPair::from_secret_bytes(&secret).unwrap();
        assert_eq!(
            keypair.address().to_hex(),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_address_parse_hex() {
        let address: Address = "0x889716f93bcf0ce09ef4e57498e94fd0b84fdad4".parse().unwrap();
        assert_eq!(address.to_hex(), "889716f93bcf0ce09ef4e57498e94fd0b84fdad4");

        let bare: Address = "889716f93bcF0ce09Ef4e57498E94fD0B84FDAD4".parse().unwrap();
        assert_eq!(address, bare);

        assert_eq!("zz".parse::<Address>().unwrap_err(), CryptoError::Hex);
        assert!("0x1234".parse::<Address>().is_err());
    }
}
