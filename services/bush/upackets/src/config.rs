//! Engine configuration.

use crate::UPacketsError;
use std::time::Duration;

/// Default maximum wire fragment size, micro-header included
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 550;

/// Default bound on incomplete reassembly entries
pub const DEFAULT_MAX_PENDING_ENTRIES: usize = 1024;

/// Default lifetime of an incomplete reassembly entry
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(30);

/// Default bound on body fragments held by one entry
pub const DEFAULT_MAX_FRAGMENTS_PER_ENTRY: usize = 4096;

/// Fragmentation and reassembly limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UPacketsConfig {
    /// Largest fragment `fragment` may emit, micro-header included
    pub max_fragment_size: usize,
    /// Incomplete entries kept before the oldest is evicted
    pub max_pending_entries: usize,
    /// Age after which an incomplete entry is dropped
    pub pending_ttl: Duration,
    /// Body fragments one entry may hold
    pub max_fragments_per_entry: usize,
}

impl Default for UPacketsConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            max_pending_entries: DEFAULT_MAX_PENDING_ENTRIES,
            pending_ttl: DEFAULT_PENDING_TTL,
            max_fragments_per_entry: DEFAULT_MAX_FRAGMENTS_PER_ENTRY,
        }
    }
}

impl UPacketsConfig {
    /// Reject bounds the reassembler cannot work with. The fragment size is
    /// not checked here: an unusable size surfaces as a capacity error when
    /// fragmenting.
    pub fn validate(&self) -> Result<(), UPacketsError> {
        if self.max_pending_entries == 0 {
            return Err(UPacketsError::Config(
                "max_pending_entries must be greater than 0".to_string(),
            ));
        }
        if self.max_fragments_per_entry == 0 {
            return Err(UPacketsError::Config(
                "max_fragments_per_entry must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UPacketsConfig::default();
        assert_eq!(config.max_fragment_size, 550);
        assert_eq!(config.max_pending_entries, 1024);
        assert_eq!(config.pending_ttl, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let config = UPacketsConfig {
            max_pending_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = UPacketsConfig {
            max_fragments_per_entry: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = UPacketsConfig {
            max_fragment_size: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
