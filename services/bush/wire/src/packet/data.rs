//! Data packets: a method name, a body and its checksum.

use super::RawPacket;
use crate::kind::PacketKind;
use crate::layout::{fixed, seal, Identity, Sections, Seal};
use crate::PacketError;
use bush_crypto::{keccak256, SessionSigner, HASH_SIZE};
use bytes::{BufMut, Bytes, BytesMut};

/// Width of the NUL-padded method name
pub const METHOD_SIZE: usize = 32;

const SUFFIX_SIZE: usize = HASH_SIZE + 4;

/// Application payload addressed to a named method.
///
/// The header carries the Keccak-256 checksum of the body and the number of
/// body fragments the body was split into by the fragmentation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Shared identity fields
    pub identity: Identity,
    method: String,
    data: Bytes,
    checksum: [u8; HASH_SIZE],
    fragment_count: u32,
    seal: Option<Seal>,
}

impl DataPacket {
    /// Create a data packet. The method name must be ASCII, without NUL, and at
    /// most 32 bytes.
    pub fn new(
        identity: Identity,
        method: &str,
        data: impl Into<Bytes>,
    ) -> Result<Self, PacketError> {
        validate_method(method)?;
        let data = data.into();
        Ok(Self {
            identity,
            method: method.to_owned(),
            checksum: keccak256(&data),
            data,
            fragment_count: 0,
            seal: None,
        })
    }

    /// Method name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Body bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Keccak-256 of the body
    pub fn checksum(&self) -> &[u8; HASH_SIZE] {
        &self.checksum
    }

    /// Number of body fragments declared in the header
    pub fn fragment_count(&self) -> u32 {
        self.fragment_count
    }

    /// Declare how many body fragments the body travels in. Must be set
    /// before [`DataPacket::build`].
    pub fn set_fragment_count(&mut self, count: u32) {
        self.fragment_count = count;
    }

    /// Session key and security signature, once built or parsed
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Lay out and sign the header; the body is returned as-is
    pub async fn build(&mut self, signer: &dyn SessionSigner) -> Result<RawPacket, PacketError> {
        let mut method = [0u8; METHOD_SIZE];
        method[..self.method.len()].copy_from_slice(self.method.as_bytes());

        let mut suffix = BytesMut::with_capacity(SUFFIX_SIZE);
        suffix.put_slice(&self.checksum);
        suffix.put_u32(self.fragment_count);

        let (header, sealed) =
            seal(PacketKind::Data, &self.identity, &method, &suffix, signer).await?;
        self.seal = Some(sealed);
        Ok(RawPacket {
            header,
            body: Some(self.data.clone()),
        })
    }

    /// Parse and authenticate a data header and its body
    pub fn parse(header: &[u8], body: &[u8], timestamp: u64) -> Result<Self, PacketError> {
        let sections = Sections::split(PacketKind::Data, header, SUFFIX_SIZE)?;

        let method = read_method(sections.prefix())?;
        let (checksum, count) = sections.suffix().split_at(HASH_SIZE);
        let checksum: [u8; HASH_SIZE] = fixed("data checksum", checksum)?;
        let fragment_count = u32::from_be_bytes(fixed("fragment count", count)?);

        sections.expect_kind()?;
        if keccak256(body) != checksum {
            return Err(PacketError::ChecksumMismatch);
        }
        let (identity, sealed) = sections.authenticate(timestamp)?;

        Ok(Self {
            identity,
            method,
            data: Bytes::copy_from_slice(body),
            checksum,
            fragment_count,
            seal: Some(sealed),
        })
    }
}

fn validate_method(method: &str) -> Result<(), PacketError> {
    if method.len() > METHOD_SIZE {
        return Err(PacketError::MethodTooLong(method.len()));
    }
    if !method.bytes().all(|b| b.is_ascii() && b != 0) {
        return Err(PacketError::MethodEncoding);
    }
    Ok(())
}

fn read_method(field: &[u8]) -> Result<String, PacketError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let name = std::str::from_utf8(&field[..end]).map_err(|_| PacketError::MethodEncoding)?;
    validate_method(name)?;
    Ok(name.to_owned())
}
