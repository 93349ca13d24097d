//! Packet kind tags.

use crate::PacketError;
use std::fmt;

/// The ten packet kinds, tagged by their first header byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Application payload
    Data = 1,
    /// Receipt for a packet
    Confirmation = 2,
    /// Report of missing packet indices
    Loss = 3,
    /// Connection teardown with an error code
    Drop = 4,
    /// Liveness check
    Ping = 5,
    /// Reply to a ping
    Pong = 6,
    /// First handshake step
    Engage = 7,
    /// Handshake reply for a remembered peer
    Remember = 8,
    /// Handshake reply for a new peer
    Respond = 9,
    /// Final handshake step
    Agree = 10,
}

impl PacketKind {
    /// All kinds in tag order
    pub const ALL: [PacketKind; 10] = [
        PacketKind::Data,
        PacketKind::Confirmation,
        PacketKind::Loss,
        PacketKind::Drop,
        PacketKind::Ping,
        PacketKind::Pong,
        PacketKind::Engage,
        PacketKind::Remember,
        PacketKind::Respond,
        PacketKind::Agree,
    ];

    /// Width of the fields between the kind byte and the identity block
    pub const fn prefix_len(self) -> usize {
        match self {
            PacketKind::Data => 32,
            PacketKind::Confirmation | PacketKind::Pong => 9,
            PacketKind::Loss => 8,
            _ => 0,
        }
    }

    /// Whether packets of this kind carry a body
    pub const fn carries_body(self) -> bool {
        matches!(self, PacketKind::Data)
    }

    /// Lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            PacketKind::Data => "data",
            PacketKind::Confirmation => "confirmation",
            PacketKind::Loss => "loss",
            PacketKind::Drop => "drop",
            PacketKind::Ping => "ping",
            PacketKind::Pong => "pong",
            PacketKind::Engage => "engage",
            PacketKind::Remember => "remember",
            PacketKind::Respond => "respond",
            PacketKind::Agree => "agree",
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketKind::Data),
            2 => Ok(PacketKind::Confirmation),
            3 => Ok(PacketKind::Loss),
            4 => Ok(PacketKind::Drop),
            5 => Ok(PacketKind::Ping),
            6 => Ok(PacketKind::Pong),
            7 => Ok(PacketKind::Engage),
            8 => Ok(PacketKind::Remember),
            9 => Ok(PacketKind::Respond),
            10 => Ok(PacketKind::Agree),
            _ => Err(PacketError::UnknownKind(value)),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
