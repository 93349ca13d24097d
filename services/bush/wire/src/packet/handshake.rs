//! Handshake packets: engage, remember, respond and agree.
//!
//! Only the shapes live here. Which packet is sent when, and what the half
//! keys and challenges mean, belongs to connection establishment.

use super::RawPacket;
use crate::kind::PacketKind;
use crate::layout::{fixed, header_size, seal, Identity, Sections, Seal};
use crate::PacketError;
use bush_crypto::SessionSigner;

/// Width of a key half
pub const HALF_KEY_SIZE: usize = 16;

/// Width of a challenge (plain or encrypted)
pub const CHALLENGE_SIZE: usize = 16;

/// Width of the optional remember hash
pub const REMEMBER_HASH_SIZE: usize = 32;

const ENGAGE_SUFFIX: usize = HALF_KEY_SIZE + CHALLENGE_SIZE;

/// First handshake step, optionally naming a remembered session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagePacket {
    /// Shared identity fields
    pub identity: Identity,
    /// Initiator's half of the symmetric key
    pub first_half_key: [u8; HALF_KEY_SIZE],
    /// Challenge the responder must encrypt
    pub first_challenge: [u8; CHALLENGE_SIZE],
    /// Hash identifying a previously agreed session
    pub remember_hash: Option<[u8; REMEMBER_HASH_SIZE]>,
    seal: Option<Seal>,
}

impl EngagePacket {
    /// Create an engage packet
    pub fn new(
        identity: Identity,
        first_half_key: &[u8],
        first_challenge: &[u8],
        remember_hash: Option<&[u8]>,
    ) -> Result<Self, PacketError> {
        Ok(Self {
            identity,
            first_half_key: fixed("first half key", first_half_key)?,
            first_challenge: fixed("first challenge", first_challenge)?,
            remember_hash: remember_hash
                .map(|hash| fixed("remember hash", hash))
                .transpose()?,
            seal: None,
        })
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let mut suffix = Vec::with_capacity(ENGAGE_SUFFIX + REMEMBER_HASH_SIZE);
        suffix.extend_from_slice(&self.first_half_key);
        suffix.extend_from_slice(&self.first_challenge);
        if let Some(hash) = &self.remember_hash {
            suffix.extend_from_slice(hash);
        }

        let (header, sealed) =
            seal(PacketKind::Engage, &self.identity, &[], &suffix, signer).await?;
        self.seal = Some(sealed);
        Ok(RawPacket::header_only(header))
    }

    /// Parse and authenticate an engage header of either size
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let short = header_size(0, ENGAGE_SUFFIX);
        let long = header_size(0, ENGAGE_SUFFIX + REMEMBER_HASH_SIZE);
        let suffix_len = match header.len() {
            len if len == short => ENGAGE_SUFFIX,
            len if len == long => ENGAGE_SUFFIX + REMEMBER_HASH_SIZE,
            actual => {
                return Err(PacketError::HeaderSize {
                    kind: PacketKind::Engage,
                    expected: short,
                    actual,
                })
            }
        };

        let sections = Sections::split(PacketKind::Engage, header, suffix_len)?;
        let suffix = sections.suffix();
        let first_half_key = fixed("first half key", &suffix[..HALF_KEY_SIZE])?;
        let first_challenge = fixed("first challenge", &suffix[HALF_KEY_SIZE..ENGAGE_SUFFIX])?;
        let remember_hash = if suffix_len > ENGAGE_SUFFIX {
            Some(fixed("remember hash", &suffix[ENGAGE_SUFFIX..])?)
        } else {
            None
        };

        sections.expect_kind()?;
        let (identity, sealed) = sections.authenticate(timestamp)?;

        Ok(Self {
            identity,
            first_half_key,
            first_challenge,
            remember_hash,
            seal: Some(sealed),
        })
    }
}

/// Reply to an engage for a remembered session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RememberPacket {
    /// Shared identity fields
    pub identity: Identity,
    /// First challenge encrypted with the remembered key
    pub encrypted_first_challenge: [u8; CHALLENGE_SIZE],
    seal: Option<Seal>,
}

impl RememberPacket {
    /// Create a remember packet
    pub fn new(identity: Identity, encrypted_first_challenge: &[u8]) -> Result<Self, PacketError> {
        Ok(Self {
            identity,
            encrypted_first_challenge: fixed(
                "encrypted first challenge",
                encrypted_first_challenge,
            )?,
            seal: None,
        })
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let (header, sealed) = seal(
            PacketKind::Remember,
            &self.identity,
            &[],
            &self.encrypted_first_challenge,
            signer,
        )
        .await?;
        self.seal = Some(sealed);
        Ok(RawPacket::header_only(header))
    }

    /// Parse and authenticate a remember header
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let sections = Sections::split(PacketKind::Remember, header, CHALLENGE_SIZE)?;
        let encrypted_first_challenge = fixed("encrypted first challenge", sections.suffix())?;
        sections.expect_kind()?;
        let (identity, sealed) = sections.authenticate(timestamp)?;
        Ok(Self {
            identity,
            encrypted_first_challenge,
            seal: Some(sealed),
        })
    }
}

/// Reply to an engage for a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespondPacket {
    /// Shared identity fields
    pub identity: Identity,
    /// Responder's half of the symmetric key
    pub second_half_key: [u8; HALF_KEY_SIZE],
    /// Challenge the initiator must encrypt
    pub second_challenge: [u8; CHALLENGE_SIZE],
    /// Initiator's challenge, encrypted
    pub encrypted_first_challenge: [u8; CHALLENGE_SIZE],
    seal: Option<Seal>,
}

impl RespondPacket {
    /// Create a respond packet
    pub fn new(
        identity: Identity,
        second_half_key: &[u8],
        second_challenge: &[u8],
        encrypted_first_challenge: &[u8],
    ) -> Result<Self, PacketError> {
        Ok(Self {
            identity,
            second_half_key: fixed("second half key", second_half_key)?,
            second_challenge: fixed("second challenge", second_challenge)?,
            encrypted_first_challenge: fixed(
                "encrypted first challenge",
                encrypted_first_challenge,
            )?,
            seal: None,
        })
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let mut suffix = [0u8; HALF_KEY_SIZE + CHALLENGE_SIZE * 2];
        suffix[..16].copy_from_slice(&self.second_half_key);
        suffix[16..32].copy_from_slice(&self.second_challenge);
        suffix[32..].copy_from_slice(&self.encrypted_first_challenge);

        let (header, sealed) =
            seal(PacketKind::Respond, &self.identity, &[], &suffix, signer).await?;
        self.seal = Some(sealed);
        Ok(RawPacket::header_only(header))
    }

    /// Parse and authenticate a respond header
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let sections = Sections::split(
            PacketKind::Respond,
            header,
            HALF_KEY_SIZE + CHALLENGE_SIZE * 2,
        )?;
        let suffix = sections.suffix();
        let second_half_key = fixed("second half key", &suffix[..16])?;
        let second_challenge = fixed("second challenge", &suffix[16..32])?;
        let encrypted_first_challenge = fixed("encrypted first challenge", &suffix[32..])?;

        sections.expect_kind()?;
        let (identity, sealed) = sections.authenticate(timestamp)?;

        Ok(Self {
            identity,
            second_half_key,
            second_challenge,
            encrypted_first_challenge,
            seal: Some(sealed),
        })
    }
}

/// Final handshake step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreePacket {
    /// Shared identity fields
    pub identity: Identity,
    /// Responder's challenge, encrypted
    pub encrypted_second_challenge: [u8; CHALLENGE_SIZE],
    seal: Option<Seal>,
}

impl AgreePacket {
    /// Create an agree packet
    pub fn new(identity: Identity, encrypted_second_challenge: &[u8]) -> Result<Self, PacketError> {
        Ok(Self {
            identity,
            encrypted_second_challenge: fixed(
                "encrypted second challenge",
                encrypted_second_challenge,
            )?,
            seal: None,
        })
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let (header, sealed) = seal(
            PacketKind::Agree,
            &self.identity,
            &[],
            &self.encrypted_second_challenge,
            signer,
        )
        .await?;
        self.seal = Some(sealed);
        Ok(RawPacket::header_only(header))
    }

    /// Parse and authenticate an agree header
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let sections = Sections::split(PacketKind::Agree, header, CHALLENGE_SIZE)?;
        let encrypted_second_challenge = fixed("encrypted second challenge", sections.suffix())?;
        sections.expect_kind()?;
        let (identity, sealed) = sections.authenticate(timestamp)?;
        Ok(Self {
            identity,
            encrypted_second_challenge,
            seal: Some(sealed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_engage_both_sizes() {
        let fx = fixture();

        let mut plain = EngagePacket::new(fx.identity.clone(), &[1; 16], &[2; 16], None).unwrap();
        let raw = plain.build(&fx.session).await.unwrap();
        assert_eq!(raw.header.len(), 268);
        let parsed = EngagePacket::parse(&raw.header, fx.identity.timestamp).unwrap();
        assert_eq!(parsed, plain);
        assert!(parsed.remember_hash.is_none());

        let mut remembered =
            EngagePacket::new(fx.identity.clone(), &[1; 16], &[2; 16], Some(&[3u8; 32][..])).unwrap();
        let raw = remembered.build(&fx.session).await.unwrap();
        assert_eq!(raw.header.len(), 300);
        let parsed = EngagePacket::parse(&raw.header, fx.identity.timestamp).unwrap();
        assert_eq!(parsed.remember_hash, Some([3; 32]));
    }

    #[test]
    fn test_engage_odd_size_is_format_error() {
        let err = EngagePacket::parse(&[7u8; 284], 0).unwrap_err();
        assert_eq!(
            err,
            PacketError::HeaderSize {
                kind: PacketKind::Engage,
                expected: 268,
                actual: 284
            }
        );
    }

    #[test]
    fn test_engage_field_widths() {
        let fx = fixture();
        assert!(EngagePacket::new(fx.identity.clone(), &[1; 15], &[2; 16], None).is_err());
        assert!(EngagePacket::new(fx.identity.clone(), &[1; 16], &[2; 17], None).is_err());
        assert_eq!(
            EngagePacket::new(fx.identity, &[1; 16], &[2; 16], Some(&[3u8; 31][..])).unwrap_err(),
            PacketError::FieldWidth {
                field: "remember hash",
                expected: 32,
                actual: 31
            }
        );
    }

    #[tokio::test]
    async fn test_remember_and_agree_share_size_not_kind() {
        let fx = fixture();
        let mut remember = RememberPacket::new(fx.identity.clone(), &[4; 16]).unwrap();
        let raw = remember.build(&fx.session).await.unwrap();
        assert_eq!(raw.header.len(), 252);

        assert_eq!(
            RememberPacket::parse(&raw.header, fx.identity.timestamp).unwrap(),
            remember
        );
        assert!(matches!(
            AgreePacket::parse(&raw.header, fx.identity.timestamp),
            Err(PacketError::KindMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_respond_roundtrip() {
        let fx = fixture();
        let mut packet =
            RespondPacket::new(fx.identity.clone(), &[5; 16], &[6; 16], &[7; 16]).unwrap();
        let raw = packet.build(&fx.session).await.unwrap();
        assert_eq!(raw.header.len(), 284);

        let parsed = RespondPacket::parse(&raw.header, fx.identity.timestamp).unwrap();
        assert_eq!(parsed.second_half_key, [5; 16]);
        assert_eq!(parsed.second_challenge, [6; 16]);
        assert_eq!(parsed.encrypted_first_challenge, [7; 16]);
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_respond_and_agree_widths() {
        let fx = fixture();
        assert!(RespondPacket::new(fx.identity.clone(), &[5; 16], &[6; 16], &[7; 8]).is_err());
        assert!(AgreePacket::new(fx.identity.clone(), &[0; 32]).is_err());
        assert!(RememberPacket::new(fx.identity, &[]).is_err());
    }

    #[tokio::test]
    async fn test_agree_roundtrip() {
        let fx = fixture();
        let mut packet = AgreePacket::new(fx.identity.clone(), &[8; 16]).unwrap();
        let raw = packet.build(&fx.session).await.unwrap();
        let parsed = AgreePacket::parse(&raw.header, fx.identity.timestamp).unwrap();
        assert_eq!(parsed, packet);
    }
}
