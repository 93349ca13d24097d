//! The packet family.
//!
//! Each kind has its own type with a `build` that lays out and signs the
//! header, and a `parse` that checks size, kind byte, checksum (data only),
//! security signature and master signature, in that order. [`Packet`] is
//! the closed union over all ten kinds.

mod control;
mod data;
mod handshake;
mod loss;
mod receipt;

pub use control::{DropPacket, PingPacket};
pub use data::{DataPacket, METHOD_SIZE};
pub use handshake::{
    AgreePacket, EngagePacket, RememberPacket, RespondPacket, CHALLENGE_SIZE, HALF_KEY_SIZE,
    REMEMBER_HASH_SIZE,
};
pub use loss::LossPacket;
pub use receipt::{ConfirmationPacket, PongPacket, PACKET_ID_SIZE};

use crate::kind::PacketKind;
use crate::layout::{Identity, Seal};
use crate::PacketError;
use bush_crypto::SessionSigner;
use bytes::Bytes;

/// Serialized packet: a header and, for kinds that carry one, a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Signed header
    pub header: Bytes,
    /// Payload for body-bearing kinds
    pub body: Option<Bytes>,
}

impl RawPacket {
    pub(crate) fn header_only(header: Bytes) -> Self {
        Self { header, body: None }
    }
}

/// Any of the ten packet kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Application payload
    Data(DataPacket),
    /// Receipt for a packet
    Confirmation(ConfirmationPacket),
    /// Report of missing packet indices
    Loss(LossPacket),
    /// Connection teardown
    Drop(DropPacket),
    /// Liveness check
    Ping(PingPacket),
    /// Reply to a ping
    Pong(PongPacket),
    /// First handshake step
    Engage(EngagePacket),
    /// Handshake reply for a remembered peer
    Remember(RememberPacket),
    /// Handshake reply for a new peer
    Respond(RespondPacket),
    /// Final handshake step
    Agree(AgreePacket),
}

impl Packet {
    /// Kind of this packet
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Data(_) => PacketKind::Data,
            Packet::Confirmation(_) => PacketKind::Confirmation,
            Packet::Loss(_) => PacketKind::Loss,
            Packet::Drop(_) => PacketKind::Drop,
            Packet::Ping(_) => PacketKind::Ping,
            Packet::Pong(_) => PacketKind::Pong,
            Packet::Engage(_) => PacketKind::Engage,
            Packet::Remember(_) => PacketKind::Remember,
            Packet::Respond(_) => PacketKind::Respond,
            Packet::Agree(_) => PacketKind::Agree,
        }
    }

    /// Shared identity fields
    pub fn identity(&self) -> &Identity {
        match self {
            Packet::Data(p) => &p.identity,
            Packet::Confirmation(p) => &p.identity,
            Packet::Loss(p) => &p.identity,
            Packet::Drop(p) => &p.identity,
            Packet::Ping(p) => &p.identity,
            Packet::Pong(p) => &p.identity,
            Packet::Engage(p) => &p.identity,
            Packet::Remember(p) => &p.identity,
            Packet::Respond(p) => &p.identity,
            Packet::Agree(p) => &p.identity,
        }
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        match self {
            Packet::Data(p) => p.seal(),
            Packet::Confirmation(p) => p.seal(),
            Packet::Loss(p) => p.seal(),
            Packet::Drop(p) => p.seal(),
            Packet::Ping(p) => p.seal(),
            Packet::Pong(p) => p.seal(),
            Packet::Engage(p) => p.seal(),
            Packet::Remember(p) => p.seal(),
            Packet::Respond(p) => p.seal(),
            Packet::Agree(p) => p.seal(),
        }
    }

    /// Lay out and sign the packet with the session signer
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        match self {
            Packet::Data(p) => p.build(signer).await,
            Packet::Confirmation(p) => p.build(signer).await,
            Packet::Loss(p) => p.build(signer).await,
            Packet::Drop(p) => p.build(signer).await,
            Packet::Ping(p) => p.build(signer).await,
            Packet::Pong(p) => p.build(signer).await,
            Packet::Engage(p) => p.build(signer).await,
            Packet::Remember(p) => p.build(signer).await,
            Packet::Respond(p) => p.build(signer).await,
            Packet::Agree(p) => p.build(signer).await,
        }
    }

    /// Parse and authenticate a header (and body), dispatching on the kind byte.
    /// A missing body is treated as empty.
    pub fn parse(header: &[u8], body: Option<&[u8]>, timestamp: u64) -> Result<Self, PacketError> {
        let first = *header.first().ok_or(PacketError::Truncated(0))?;
        let packet = match PacketKind::try_from(first)? {
            PacketKind::Data => {
                Packet::Data(DataPacket::parse(header, body.unwrap_or_default(), timestamp)?)
            }
            PacketKind::Confirmation => {
                Packet::Confirmation(ConfirmationPacket::parse(header, timestamp)?)
            }
            PacketKind::Loss => Packet::Loss(LossPacket::parse(header, timestamp)?),
            PacketKind::Drop => Packet::Drop(DropPacket::parse(header, timestamp)?),
            PacketKind::Ping => Packet::Ping(PingPacket::parse(header, timestamp)?),
            PacketKind::Pong => Packet::Pong(PongPacket::parse(header, timestamp)?),
            PacketKind::Engage => Packet::Engage(EngagePacket::parse(header, timestamp)?),
            PacketKind::Remember => Packet::Remember(RememberPacket::parse(header, timestamp)?),
            PacketKind::Respond => Packet::Respond(RespondPacket::parse(header, timestamp)?),
            PacketKind::Agree => Packet::Agree(AgreePacket::parse(header, timestamp)?),
        };
        Ok(packet)
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Packet {
                fn from(packet: $ty) -> Self {
                    Packet::$variant(packet)
                }
            }
        )*
    };
}

impl_from_variant! {
    Data => DataPacket,
    Confirmation => ConfirmationPacket,
    Loss => LossPacket,
    Drop => DropPacket,
    Ping => PingPacket,
    Pong => PongPacket,
    Engage => EngagePacket,
    Remember => RememberPacket,
    Respond => RespondPacket,
    Agree => AgreePacket,
}
