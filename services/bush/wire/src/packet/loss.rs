//! Loss reports: which packet indices a peer has not received.

use super::RawPacket;
use crate::kind::PacketKind;
use crate::layout::{fixed, header_size, seal, Identity, Sections, Seal, IDENTITY_SIZE, KIND_SIZE};
use crate::miss::{self, MissEntry};
use crate::PacketError;
use bush_crypto::SessionSigner;
use bytes::{BufMut, BytesMut};

const LOSS_ID_SIZE: usize = 8;
const MISS_LEN_SIZE: usize = 2;
const MISS_LEN_OFFSET: usize = KIND_SIZE + LOSS_ID_SIZE + IDENTITY_SIZE;

/// Report of missing indices for a packet id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossPacket {
    /// Shared identity fields
    pub identity: Identity,
    /// Id of the packet the report refers to
    pub packet_id: [u8; LOSS_ID_SIZE],
    miss: Vec<MissEntry>,
    seal: Option<Seal>,
}

impl LossPacket {
    /// Create a loss report. The encoded miss field must fit its u16 length.
    pub fn new(
        identity: Identity,
        packet_id: &[u8],
        miss: Vec<MissEntry>,
    ) -> Result<Self, PacketError> {
        let packet_id = fixed("packet id", packet_id)?;
        let encoded = miss::encoded_len(&miss);
        if encoded > u16::MAX as usize {
            return Err(PacketError::MissFieldTooLarge(encoded));
        }
        Ok(Self {
            identity,
            packet_id,
            miss: miss::wire_order(miss),
            seal: None,
        })
    }

    /// Missing indices, ranges first and then unique indices
    pub fn miss(&self) -> &[MissEntry] {
        &self.miss
    }

    /// Header size this report will serialize to
    pub fn header_len(&self) -> usize {
        header_size(LOSS_ID_SIZE, MISS_LEN_SIZE + miss::encoded_len(&self.miss))
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let field = miss::encode(&self.miss);
        let mut suffix = BytesMut::with_capacity(MISS_LEN_SIZE + field.len());
        suffix.put_u16(field.len() as u16);
        suffix.put_slice(&field);

        let (header, sealed) = seal(
            PacketKind::Loss,
            &self.identity,
            &self.packet_id,
            &suffix,
            signer,
        )
        .await?;
        self.seal = Some(sealed);
        Ok(RawPacket::header_only(header))
    }

    /// Parse and authenticate a loss header. The declared miss-field length
    /// and the miss field itself are checked before any signature.
    pub fn parse(header: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let minimum = header_size(LOSS_ID_SIZE, MISS_LEN_SIZE);
        if header.len() < minimum {
            return Err(PacketError::HeaderSize {
                kind: PacketKind::Loss,
                expected: minimum,
                actual: header.len(),
            });
        }
        let miss_len = u16::from_be_bytes([header[MISS_LEN_OFFSET], header[MISS_LEN_OFFSET + 1]]);

        let sections = Sections::split(
            PacketKind::Loss,
            header,
            MISS_LEN_SIZE + miss_len as usize,
        )?;
        let packet_id = fixed("packet id", sections.prefix())?;
        let miss = miss::wire_order(miss::decode(&sections.suffix()[MISS_LEN_SIZE..])?);

        sections.expect_kind()?;
        let (identity, sealed) = sections.authenticate(timestamp)?;

        Ok(Self {
            identity,
            packet_id,
            miss,
            seal: Some(sealed),
        })
    }
}
