//! Shared header layout.
//!
//! Every header is
//!
//! ```text
//! +---------+--------+------------------+--------+--------------------+
//! | kind(1) | prefix | identity (170)   | suffix | security sig (65)  |
//! +---------+--------+------------------+--------+--------------------+
//!
//! identity = master_address(20) ‖ destination_address(20)
//!          ‖ session_public_key(65) ‖ master_signature(65)
//! ```
//!
//! The security signature covers every header byte before it followed by
//! the big-endian timestamp.

use crate::kind::PacketKind;
use crate::PacketError;
use bush_crypto::{
    verify, Address, PublicKey, SessionSigner, Signature, ADDRESS_SIZE, PUBLIC_KEY_SIZE,
    SIGNATURE_SIZE,
};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// Kind byte width
pub const KIND_SIZE: usize = 1;

/// Identity block width
pub const IDENTITY_SIZE: usize = ADDRESS_SIZE * 2 + PUBLIC_KEY_SIZE + SIGNATURE_SIZE;

/// Trailing security signature width
pub const SECURITY_SIGNATURE_SIZE: usize = SIGNATURE_SIZE;

/// Timestamp width in the signed region
pub const TIMESTAMP_SIZE: usize = 8;

/// Total header size for the given prefix and suffix widths
pub const fn header_size(prefix_len: usize, suffix_len: usize) -> usize {
    KIND_SIZE + prefix_len + IDENTITY_SIZE + suffix_len + SECURITY_SIGNATURE_SIZE
}

/// Fields shared by every packet kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Address of the long-lived identity that endorsed the session key
    pub master_address: Address,
    /// Address the packet is meant for
    pub destination_address: Address,
    /// Master signature over the session key's address
    pub master_signature: Signature,
    /// Sender timestamp, bound into the security signature
    pub timestamp: u64,
}

impl Identity {
    /// Build from typed parts
    pub fn new(
        master_address: Address,
        destination_address: Address,
        master_signature: Signature,
        timestamp: u64,
    ) -> Self {
        Self {
            master_address,
            destination_address,
            master_signature,
            timestamp,
        }
    }

    /// Build from raw byte fields, rejecting malformed widths
    pub fn from_slices(
        master_address: &[u8],
        destination_address: &[u8],
        master_signature: &[u8],
        timestamp: u64,
    ) -> Result<Self, PacketError> {
        let master_address =
            Address::from_slice(master_address).map_err(|_| PacketError::InvalidAddress {
                field: "master address",
                actual: master_address.len(),
            })?;
        let destination_address = Address::from_slice(destination_address).map_err(|_| {
            PacketError::InvalidAddress {
                field: "destination address",
                actual: destination_address.len(),
            }
        })?;
        let master_signature = Signature::from_slice(master_signature)
            .map_err(|_| PacketError::SignatureLength(master_signature.len()))?;

        Ok(Self::new(
            master_address,
            destination_address,
            master_signature,
            timestamp,
        ))
    }
}

/// Session key and security signature attached when a packet is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal {
    /// Session public key embedded in the header
    pub session_public_key: PublicKey,
    /// Session signature over the header and timestamp
    pub security_signature: Signature,
}

/// Copy a fixed-width field, rejecting any other width
pub(crate) fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N], PacketError> {
    bytes.try_into().map_err(|_| PacketError::FieldWidth {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

fn signed_region(unsigned_header: &[u8], timestamp: u64) -> Vec<u8> {
    let mut region = Vec::with_capacity(unsigned_header.len() + TIMESTAMP_SIZE);
    region.extend_from_slice(unsigned_header);
    region.extend_from_slice(&timestamp.to_be_bytes());
    region
}

/// Lay out and sign a header
pub(crate) async fn seal(
    kind: PacketKind,
    identity: &Identity,
    prefix: &[u8],
    suffix: &[u8],
    signer: &dyn SessionSigner,
) -> Result<(Bytes, Seal), PacketError> {
    debug_assert_eq!(prefix.len(), kind.prefix_len());

    let session_public_key = signer.public_key();
    let mut buf = BytesMut::with_capacity(header_size(prefix.len(), suffix.len()));
    buf.put_u8(kind as u8);
    buf.put_slice(prefix);
    buf.put_slice(identity.master_address.as_bytes());
    buf.put_slice(identity.destination_address.as_bytes());
    buf.put_slice(&session_public_key.to_bytes());
    buf.put_slice(identity.master_signature.as_bytes());
    buf.put_slice(suffix);

    let security_signature = signer
        .sign(&signed_region(&buf, identity.timestamp))
        .await?;
    buf.put_slice(security_signature.as_bytes());

    trace!("sealed {} header of {} bytes", kind, buf.len());
    Ok((
        buf.freeze(),
        Seal {
            session_public_key,
            security_signature,
        },
    ))
}

/// A header split along its layout, not yet authenticated
pub(crate) struct Sections<'a> {
    kind: PacketKind,
    header: &'a [u8],
    prefix: &'a [u8],
    identity: &'a [u8],
    suffix: &'a [u8],
}

impl<'a> Sections<'a> {
    /// Split `header` as a `kind` header with a `suffix_len` suffix. The
    /// size must match exactly.
    pub(crate) fn split(
        kind: PacketKind,
        header: &'a [u8],
        suffix_len: usize,
    ) -> Result<Self, PacketError> {
        let prefix_len = kind.prefix_len();
        let expected = header_size(prefix_len, suffix_len);
        if header.len() != expected {
            return Err(PacketError::HeaderSize {
                kind,
                expected,
                actual: header.len(),
            });
        }

        let (_, rest) = header.split_at(KIND_SIZE);
        let (prefix, rest) = rest.split_at(prefix_len);
        let (identity, rest) = rest.split_at(IDENTITY_SIZE);
        let (suffix, _) = rest.split_at(suffix_len);

        Ok(Self {
            kind,
            header,
            prefix,
            identity,
            suffix,
        })
    }

    pub(crate) fn prefix(&self) -> &'a [u8] {
        self.prefix
    }

    pub(crate) fn suffix(&self) -> &'a [u8] {
        self.suffix
    }

    /// Check the kind byte against the variant being parsed
    pub(crate) fn expect_kind(&self) -> Result<(), PacketError> {
        let found = self.header[0];
        if found != self.kind as u8 {
            return Err(PacketError::KindMismatch {
                expected: self.kind,
                found,
            });
        }
        Ok(())
    }

    /// Verify the security signature, then the master signature
    pub(crate) fn authenticate(&self, timestamp: u64) -> Result<(Identity, Seal), PacketError> {
        let (master_address, rest) = self.identity.split_at(ADDRESS_SIZE);
        let (destination_address, rest) = rest.split_at(ADDRESS_SIZE);
        let (session_public_key, master_signature) = rest.split_at(PUBLIC_KEY_SIZE);

        let identity = Identity::from_slices(
            master_address,
            destination_address,
            master_signature,
            timestamp,
        )?;
        let session_public_key =
            PublicKey::from_slice(session_public_key).map_err(|_| PacketError::SessionKey)?;
        let session_address = session_public_key.address();

        let signed_len = self.header.len() - SECURITY_SIGNATURE_SIZE;
        let security_signature = Signature::from_slice(&self.header[signed_len..])
            .map_err(|_| PacketError::SecuritySignature)?;

        if !verify(
            &signed_region(&self.header[..signed_len], timestamp),
            &security_signature,
            &session_address,
        ) {
            return Err(PacketError::SecuritySignature);
        }

        if !verify(
            session_address.as_bytes(),
            &identity.master_signature,
            &identity.master_address,
        ) {
            return Err(PacketError::MasterSignature);
        }

        Ok((
            identity,
            Seal {
                session_public_key,
                security_signature,
            },
        ))
    }
}

/// Fields the reassembly engine reads from a decrypted header before the
/// packet is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSummary {
    /// Packet kind
    pub kind: PacketKind,
    /// Master address of the sender
    pub master_address: Address,
    /// Number of body fragments declared by the header (0 for kinds without a body)
    pub fragment_count: u32,
}

/// Offset of the fragment count inside a data header
const DATA_FRAGMENT_COUNT_OFFSET: usize =
    KIND_SIZE + PacketKind::Data.prefix_len() + IDENTITY_SIZE + 32;

/// Read the kind, master address and declared fragment count from an
/// unauthenticated header. Full verification happens in [`crate::Packet::parse`].
pub fn inspect(header: &[u8]) -> Result<HeaderSummary, PacketError> {
    let first = *header.first().ok_or(PacketError::Truncated(0))?;
    let kind = PacketKind::try_from(first)?;

    let address_offset = KIND_SIZE + kind.prefix_len();
    let master_address = header
        .get(address_offset..address_offset + ADDRESS_SIZE)
        .ok_or(PacketError::Truncated(header.len()))?;
    let master_address =
        Address::from_slice(master_address).map_err(|_| PacketError::Truncated(header.len()))?;

    let fragment_count = if kind.carries_body() {
        let count = header
            .get(DATA_FRAGMENT_COUNT_OFFSET..DATA_FRAGMENT_COUNT_OFFSET + 4)
            .ok_or(PacketError::Truncated(header.len()))?;
        u32::from_be_bytes(fixed("fragment count", count)?)
    } else {
        0
    };

    Ok(HeaderSummary {
        kind,
        master_address,
        fragment_count,
    })
}

/// Verify the session and master signatures of a decrypted header without
/// its body, returning its summary. The signatures cover every header byte,
/// so a header accepted here is exactly what the endorsed session signed.
/// The data checksum and per-kind field layout are checked later by
/// [`crate::Packet::parse`].
pub fn authenticate_header(header: &[u8], timestamp: u64) -> Result<HeaderSummary, PacketError> {
    let summary = inspect(header)?;
    let minimum = header_size(summary.kind.prefix_len(), 0);
    if header.len() < minimum {
        return Err(PacketError::HeaderSize {
            kind: summary.kind,
            expected: minimum,
            actual: header.len(),
        });
    }

    let sections = Sections::split(summary.kind, header, header.len() - minimum)?;
    sections.authenticate(timestamp)?;
    Ok(summary)
}
