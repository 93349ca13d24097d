//! Fragmentation engine error types.

use crate::fragment::CorrelationId;
use crate::scheme::EncryptionScheme;
use bush_crypto::CryptoError;
use bush_wire::PacketError;
use thiserror::Error;

/// Fragmentation engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UPacketsError {
    /// Packet construction, format or authentication failure
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Packet or key does not fit the fragment format
    #[error("capacity: {0}")]
    Capacity(#[from] CapacityError),

    /// Fragment could not be reassembled
    #[error("reassembly: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// Header or body encryption failed
    #[error("encryption failed: {0}")]
    Encrypt(CryptoError),

    /// Engine configuration is unusable
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors raised by `fragment` before any fragment is emitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// Fragment (micro-header included) larger than the configured maximum
    #[error("fragment of {size} bytes exceeds max fragment size {max}")]
    FragmentTooLarge {
        /// Size the fragment would have
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Body key has the wrong width for the scheme
    #[error("{scheme} body key must be {expected} bytes, got {actual}")]
    BodyKeyLength {
        /// Requested body scheme
        scheme: EncryptionScheme,
        /// Required width
        expected: usize,
        /// Supplied width
        actual: usize,
    },

    /// Body key has the right width but is not a usable key
    #[error("invalid {0} body key")]
    InvalidBodyKey(EncryptionScheme),

    /// Body needs more fragments than an index can address
    #[error("body needs {0} fragments")]
    TooManyFragments(usize),
}

/// Errors raised by `feed`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// Fragment shorter than its micro-header
    #[error("fragment too short: {0} bytes")]
    ShortFragment(usize),

    /// Micro-header declares more payload than the fragment carries
    #[error("fragment payload truncated: declared {declared}, available {available}")]
    PayloadTruncated {
        /// Declared payload size
        declared: usize,
        /// Bytes present after the micro-header
        available: usize,
    },

    /// Scheme tag is not a known encryption scheme
    #[error("unknown encryption scheme {0}")]
    UnknownScheme(u8),

    /// Header fragment could not be decrypted
    #[error("header decryption failed: {0}")]
    HeaderDecrypt(CryptoError),

    /// Reassembled body could not be decrypted
    #[error("body decryption failed: {0}")]
    BodyDecrypt(CryptoError),

    /// No symmetric key is known for the sender; the entry is kept under
    /// `correlation` for a later retry
    #[error("no body key for master address {master_address} (entry {correlation})")]
    MissingBodyKey {
        /// Sender's master address, lowercase hex
        master_address: String,
        /// Entry awaiting the key
        correlation: CorrelationId,
    },

    /// Body fragment index outside the range declared by the header
    #[error("fragment index {index} outside 1..={count}")]
    FragmentIndex {
        /// Offending index
        index: u32,
        /// Declared body fragment count
        count: u32,
    },

    /// Entry already holds the maximum number of fragments
    #[error("entry holds too many fragments (limit {0})")]
    TooManyFragments(usize),
}

impl UPacketsError {
    /// Whether this error left the reassembly entry intact so that the
    /// caller can retry completion later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UPacketsError::Reassembly(ReassemblyError::MissingBodyKey { .. })
        )
    }
}
