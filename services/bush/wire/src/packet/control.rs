//! Drop and ping packets.

use super::RawPacket;
use crate::kind::PacketKind;
use crate::layout::{fixed, seal, Identity, Sections, Seal};
use crate::PacketError;
use bush_crypto::SessionSigner;

/// Connection teardown carrying an error code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPacket {
    /// Shared identity fields
    pub identity: Identity,
    /// Reason for the drop
    pub error_code: u16,
    seal: Option<Seal>,
}

impl DropPacket {
    /// Create a drop packet
    pub fn new(identity: Identity, error_code: u16) -> Self {
        Self {
            identity,
            error_code,
            seal: None,
        }
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let code = self.error_code.to_be_bytes();
        let (header, sealed) = seal(PacketKind::Drop, &self.identity, &[], &code, signer).await?;
        self.seal = Some(sealed);
        Ok(RawPacket::header_only(header))
    }

    /// Parse and authenticate a drop header
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let sections = Sections::split(PacketKind::Drop, header, 2)?;
        let error_code = u16::from_be_bytes(fixed("error code", sections.suffix())?);
        sections.expect_kind()?;
        let (identity, sealed) = sections.authenticate(timestamp)?;
        Ok(Self {
            identity,
            error_code,
            seal: Some(sealed),
        })
    }
}

/// Liveness check; the header carries nothing beyond the identity block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPacket {
    /// Shared identity fields
    pub identity: Identity,
    seal: Option<Seal>,
}

impl PingPacket {
    /// Create a ping
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            seal: None,
        }
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let (header, sealed) = seal(PacketKind::Ping, &self.identity, &[], &[], signer).await?;
        self.seal = Some(sealed);
        Ok(RawPacket::header_only(header))
    }

    /// Parse and authenticate a ping header
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let sections = Sections::split(PacketKind::Ping, header, 0)?;
        sections.expect_kind()?;
        let (identity, sealed) = sections.authenticate(timestamp)?;
        Ok(Self {
            identity,
            seal: Some(sealed),
        })
    }
}
