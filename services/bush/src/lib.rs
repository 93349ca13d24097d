//! Peer-to-peer transport core.
//!
//! Umbrella crate re-exporting the three layers of the transport:
//!
//! - [`crypto`]: secp256k1 identities, account addresses, signatures and
//!   the two body/header encryption schemes
//! - [`wire`]: the authenticated packet family and the miss-field codec
//! - [`upackets`]: fragmentation of packets into encrypted wire fragments
//!   and reassembly of fragments back into verified packets

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use bush_crypto as crypto;
pub use bush_upackets as upackets;
pub use bush_wire as wire;
