//! Fragmentation and reassembly of authenticated bush packets.
//!
//! A packet leaves as one EC-encrypted header fragment followed by zero or
//! more body fragments, each at most `max_fragment_size` bytes including a
//! 15-byte micro-header. Fragments may arrive in any order and interleaved
//! with other packets; [`UPackets::feed`] hands back each packet once its
//! last fragment is in and every signature checks out.
//!
//! ## Wire Format
//!
//! ```text
//! +-----------+-------------------+-----------+----------+-----------------+
//! | scheme(1) | correlation id(8) | index u32 | size u16 | payload (size)  |
//! +-----------+-------------------+-----------+----------+-----------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fragment;
pub mod fragmenter;
pub mod reassembler;
pub mod scheme;

pub use config::UPacketsConfig;
pub use error::{CapacityError, ReassemblyError, UPacketsError};
pub use fragment::{CorrelationId, Fragment, MICRO_HEADER_SIZE};
pub use fragmenter::Fragmenter;
pub use reassembler::{BodyKeyLookup, NoBodyKeys, Reassembler};
pub use scheme::EncryptionScheme;

use bush_crypto::{KeyPair, PublicKey, SessionSigner};
use bush_wire::Packet;
use bytes::Bytes;

/// Size of `plain_size` bytes once encrypted with `scheme`
pub fn estimate_encrypted_size(scheme: EncryptionScheme, plain_size: usize) -> usize {
    scheme.estimate_encrypted_size(plain_size)
}

/// Number of `fragment_size` pieces `data` needs once encrypted with `scheme`
pub fn estimate_fragment_count(scheme: EncryptionScheme, data: &[u8], fragment_size: usize) -> usize {
    scheme.estimate_fragment_count(data, fragment_size)
}

/// One fragmentation engine: a fragmenter and its reassembly store.
///
/// Owned by the transport binding; independent instances share nothing.
pub struct UPackets {
    fragmenter: Fragmenter,
    reassembler: Reassembler,
}

impl UPackets {
    /// Create an engine from a validated configuration
    pub fn new(config: UPacketsConfig) -> Result<Self, UPacketsError> {
        Ok(Self {
            fragmenter: Fragmenter::new(config.max_fragment_size),
            reassembler: Reassembler::new(config)?,
        })
    }

    /// Build `packet` and split it into wire fragments. See [`Fragmenter::fragment`].
    pub async fn fragment(
        &self,
        scheme: EncryptionScheme,
        packet: &mut Packet,
        signer: &dyn SessionSigner,
        header_key: &PublicKey,
        body_key: &[u8],
    ) -> Result<Vec<Bytes>, UPacketsError> {
        self.fragmenter
            .fragment(scheme, packet, signer, header_key, body_key)
            .await
    }

    /// Feed one received fragment. See [`Reassembler::feed`].
    pub fn feed<L>(
        &self,
        fragment: &[u8],
        header_key: &KeyPair,
        lookup: &L,
    ) -> Result<Option<Packet>, UPacketsError>
    where
        L: BodyKeyLookup + ?Sized,
    {
        self.reassembler.feed(fragment, header_key, lookup)
    }

    /// Retry completing an entry, typically after a missing body key became
    /// available. See [`Reassembler::try_complete`].
    pub fn try_complete<L>(
        &self,
        key: &CorrelationId,
        header_key: &KeyPair,
        lookup: &L,
    ) -> Result<Option<Packet>, UPacketsError>
    where
        L: BodyKeyLookup + ?Sized,
    {
        self.reassembler.try_complete(key, header_key, lookup)
    }

    /// Drop expired incomplete entries
    pub fn purge_expired(&self) -> usize {
        self.reassembler.purge_expired()
    }

    /// Number of incomplete entries
    pub fn pending(&self) -> usize {
        self.reassembler.pending()
    }

    /// The fragmenter half
    pub fn fragmenter(&self) -> &Fragmenter {
        &self.fragmenter
    }

    /// The reassembly half
    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }
}
