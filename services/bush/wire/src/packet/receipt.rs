//! Confirmation and pong packets: a 9-byte packet id ahead of the identity block.

use super::RawPacket;
use crate::kind::PacketKind;
use crate::layout::{fixed, seal, Identity, Sections, Seal};
use crate::PacketError;
use bush_crypto::SessionSigner;

/// Width of the packet id carried by confirmations and pongs
pub const PACKET_ID_SIZE: usize = 9;

async fn build_receipt(
    kind: PacketKind,
    identity: &Identity,
    packet_id: &[u8; PACKET_ID_SIZE],
    signer: &dyn SessionSigner,
) -> Result<(RawPacket, Seal), PacketError> {
    let (header, sealed) = seal(kind, identity, packet_id, &[], signer).await?;
    Ok((RawPacket::header_only(header), sealed))
}

fn parse_receipt(
    kind: PacketKind,
    header: &[u8],
    timestamp: u64,
) -> Result<(Identity, Seal, [u8; PACKET_ID_SIZE]), PacketError> {
    let sections = Sections::split(kind, header, 0)?;
    let packet_id = fixed("packet id", sections.prefix())?;
    sections.expect_kind()?;
    let (identity, sealed) = sections.authenticate(timestamp)?;
    Ok((identity, sealed, packet_id))
}

/// Receipt for a received packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPacket {
    /// Shared identity fields
    pub identity: Identity,
    /// Id of the confirmed packet
    pub packet_id: [u8; PACKET_ID_SIZE],
    seal: Option<Seal>,
}

impl ConfirmationPacket {
    /// Create a confirmation for `packet_id`
    pub fn new(identity: Identity, packet_id: &[u8]) -> Result<Self, PacketError> {
        Ok(Self {
            identity,
            packet_id: fixed("packet id", packet_id)?,
            seal: None,
        })
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let (raw, sealed) =
            build_receipt(PacketKind::Confirmation, &self.identity, &self.packet_id, signer)
                .await?;
        self.seal = Some(sealed);
        Ok(raw)
    }

    /// Parse and authenticate a confirmation header
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let (identity, sealed, packet_id) =
            parse_receipt(PacketKind::Confirmation, header, timestamp)?;
        Ok(Self {
            identity,
            packet_id,
            seal: Some(sealed),
        })
    }
}

/// Reply to a ping, echoing a packet id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongPacket {
    /// Shared identity fields
    pub identity: Identity,
    /// Id of the ping being answered
    pub packet_id: [u8; PACKET_ID_SIZE],
    seal: Option<Seal>,
}

impl PongPacket {
    /// Create a pong for `packet_id`
    pub fn new(identity: Identity, packet_id: &[u8]) -> Result<Self, PacketError> {
        Ok(Self {
            identity,
            packet_id: fixed("packet id", packet_id)?,
            seal: None,
        })
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let (raw, sealed) =
            build_receipt(PacketKind::Pong, &self.identity, &self.packet_id, signer).await?;
        self.seal = Some(sealed);
        Ok(raw)
    }

    /// Parse and authenticate a pong header
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let (identity, sealed, packet_id) = parse_receipt(PacketKind::Pong, header, timestamp)?;
        Ok(Self {
            identity,
            packet_id,
            seal: Some(sealed),
        })
    }
}
