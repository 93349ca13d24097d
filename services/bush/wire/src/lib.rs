//! Authenticated packet family and miss-field codec for bush.
//!
//! Every packet is a fixed-layout, big-endian header bound by two
//! signatures: the master identity endorses a short-lived session key, and
//! the session key signs the header.
//!
//! ## Header Layout
//!
//! ```text
//! +---------+-------------------+-----------------------+-------------------+-----------+
//! | kind(1) | prefix (per kind) | identity block (170B) | suffix (per kind) | sig (65B) |
//! +---------+-------------------+-----------------------+-------------------+-----------+
//! ```
//!
//! | Kind         | prefix        | suffix                                  | size      |
//! |--------------|---------------|-----------------------------------------|-----------|
//! | Data         | method 32     | checksum 32, fragment count u32         | 304       |
//! | Confirmation | packet id 9   |                                         | 245       |
//! | Loss         | packet id 8   | miss length u16, miss field             | 246 + n   |
//! | Drop         |               | error code u16                          | 238       |
//! | Ping         |               |                                         | 236       |
//! | Pong         | packet id 9   |                                         | 245       |
//! | Engage       |               | half key 16, challenge 16, [hash 32]    | 268 / 300 |
//! | Remember     |               | encrypted challenge 16                  | 252       |
//! | Respond      |               | half key 16, challenge 16, enc chal. 16 | 284       |
//! | Agree        |               | encrypted challenge 16                  | 252       |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod kind;
pub mod layout;
pub mod miss;
pub mod packet;

pub use error::{ErrorCategory, PacketError};
pub use kind::PacketKind;
pub use layout::{
    authenticate_header, header_size, inspect, HeaderSummary, Identity, Seal, IDENTITY_SIZE,
};
pub use miss::MissEntry;
pub use packet::{
    AgreePacket, ConfirmationPacket, DataPacket, DropPacket, EngagePacket, LossPacket, Packet,
    PingPacket, PongPacket, RawPacket, RememberPacket, RespondPacket, METHOD_SIZE,
};
