//! Packet family error types.

use crate::kind::PacketKind;
use bush_crypto::CryptoError;
use thiserror::Error;

/// Broad class of a [`PacketError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input rejected before any I/O or crypto call
    Construction,
    /// Header or miss field does not match its layout
    Format,
    /// A signature, checksum or kind check failed
    Authentication,
}

/// Packet construction, format and authentication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Address field is not a 20-byte account address
    #[error("invalid {field}: expected a 20-byte address, got {actual} bytes")]
    InvalidAddress {
        /// Field name
        field: &'static str,
        /// Supplied length
        actual: usize,
    },

    /// Master signature is not 65 bytes
    #[error("invalid master signature: expected 65 bytes, got {0}")]
    SignatureLength(usize),

    /// Fixed-width field has the wrong width
    #[error("invalid {field}: expected {expected} bytes, got {actual}")]
    FieldWidth {
        /// Field name
        field: &'static str,
        /// Required width
        expected: usize,
        /// Supplied width
        actual: usize,
    },

    /// Method name longer than its 32-byte slot
    #[error("method name too long: {0} bytes (max 32)")]
    MethodTooLong(usize),

    /// Method name contains non-ASCII or NUL characters
    #[error("method name must be printable ascii")]
    MethodEncoding,

    /// Encoded miss field does not fit its u16 length prefix
    #[error("miss field too large: {0} bytes")]
    MissFieldTooLarge(usize),

    /// Session signer failed
    #[error("signing failed: {0}")]
    Signing(#[from] CryptoError),

    /// Header size does not match the layout of its kind
    #[error("invalid {kind} header size: expected {expected} bytes, got {actual}")]
    HeaderSize {
        /// Kind whose layout was applied
        kind: PacketKind,
        /// Expected size (the minimum, for variable layouts)
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Header too short to carry the fields being read
    #[error("truncated header: {0} bytes")]
    Truncated(usize),

    /// Kind byte is not one of the ten packet kinds
    #[error("unknown packet kind {0}")]
    UnknownKind(u8),

    /// Miss field ends in the middle of a record
    #[error("truncated miss field: tag {tag} needs {needed} bytes, {remaining} remaining")]
    MissTruncated {
        /// Record tag
        tag: u8,
        /// Bytes the record requires
        needed: usize,
        /// Bytes left in the field
        remaining: usize,
    },

    /// Miss field record tag is neither 0 nor 1
    #[error("unknown miss field tag {0}")]
    MissTag(u8),

    /// Kind byte does not match the variant being parsed
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Variant being parsed
        expected: PacketKind,
        /// Kind byte found in the header
        found: u8,
    },

    /// Body digest differs from the header checksum
    #[error("invalid data checksum")]
    ChecksumMismatch,

    /// Embedded session public key is not a valid key
    #[error("invalid session public key")]
    SessionKey,

    /// Security signature was not produced by the embedded session key
    #[error("invalid security signature")]
    SecuritySignature,

    /// Master signature does not endorse the embedded session key
    #[error("invalid master signature")]
    MasterSignature,
}

impl PacketError {
    /// Category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            PacketError::InvalidAddress { .. }
            | PacketError::SignatureLength(_)
            | PacketError::FieldWidth { .. }
            | PacketError::MethodTooLong(_)
            | PacketError::MethodEncoding
            | PacketError::MissFieldTooLarge(_)
            | PacketError::Signing(_) => ErrorCategory::Construction,
            PacketError::HeaderSize { .. }
            | PacketError::Truncated(_)
            | PacketError::UnknownKind(_)
            | PacketError::MissTruncated { .. }
            | PacketError::MissTag(_) => ErrorCategory::Format,
            PacketError::KindMismatch { .. }
            | PacketError::ChecksumMismatch
            | PacketError::SessionKey
            | PacketError::SecuritySignature
            | PacketError::MasterSignature => ErrorCategory::Authentication,
        }
    }
}
