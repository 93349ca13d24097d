//! Configuration handling for the `bush` binary.
//!
//! Values come from a YAML file, then `BUSH_*` environment variables, then
//! command-line flags, each layer overriding the previous one.

use anyhow::{Context, Result};
use bush_upackets::UPacketsConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Engine settings for the `bush` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BushConfig {
    /// Largest wire fragment, micro-header included
    pub max_fragment_size: usize,
    /// Incomplete packets kept before the oldest is evicted
    pub max_pending_entries: usize,
    /// Age at which an incomplete packet is dropped
    pub pending_ttl: Duration,
    /// Fragments accepted for a single packet
    pub max_fragments_per_entry: usize,
}

impl Default for BushConfig {
    fn default() -> Self {
        let engine = UPacketsConfig::default();
        Self {
            max_fragment_size: engine.max_fragment_size,
            max_pending_entries: engine.max_pending_entries,
            pending_ttl: engine.pending_ttl,
            max_fragments_per_entry: engine.max_fragments_per_entry,
        }
    }
}

/// Root of the YAML file
#[derive(Debug, Deserialize)]
struct RootConfig {
    bush: Option<FileConfig>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    max_fragment_size: Option<usize>,
    max_pending_entries: Option<usize>,
    /// Human-readable duration such as `30s` or `2m`
    pending_ttl: Option<String>,
    max_fragments_per_entry: Option<usize>,
}

impl BushConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    config.apply_root_config(root)?;
                    info!("Loaded configuration from {:?}", path);
                }
                Err(e) => warn!("Failed to parse config file {:?} ({}), using defaults", path, e),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", path),
        }

        config.apply_environment_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_root_config(&mut self, root: RootConfig) -> Result<()> {
        let Some(file) = root.bush else {
            return Ok(());
        };

        if let Some(size) = file.max_fragment_size {
            self.max_fragment_size = size;
        }
        if let Some(max) = file.max_pending_entries {
            self.max_pending_entries = max;
        }
        if let Some(ttl) = file.pending_ttl {
            self.pending_ttl = humantime::parse_duration(&ttl)
                .with_context(|| format!("invalid pending_ttl {:?}", ttl))?;
        }
        if let Some(max) = file.max_fragments_per_entry {
            self.max_fragments_per_entry = max;
        }
        Ok(())
    }

    /// Apply `BUSH_*` overrides read through `var`. Unparseable values are
    /// ignored with a warning.
    pub fn apply_environment_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var("BUSH_MAX_FRAGMENT_SIZE") {
            match value.parse::<usize>() {
                Ok(size) => {
                    self.max_fragment_size = size;
                    info!("Max fragment size overridden by environment: {}", size);
                }
                Err(_) => warn!("Ignoring invalid BUSH_MAX_FRAGMENT_SIZE {:?}", value),
            }
        }

        if let Some(value) = var("BUSH_PENDING_TTL_SECS") {
            match value.parse::<u64>() {
                Ok(secs) => {
                    self.pending_ttl = Duration::from_secs(secs);
                    info!("Pending TTL overridden by environment: {}s", secs);
                }
                Err(_) => warn!("Ignoring invalid BUSH_PENDING_TTL_SECS {:?}", value),
            }
        }

        if let Some(value) = var("BUSH_MAX_PENDING") {
            match value.parse::<usize>() {
                Ok(max) => {
                    self.max_pending_entries = max;
                    info!("Max pending entries overridden by environment: {}", max);
                }
                Err(_) => warn!("Ignoring invalid BUSH_MAX_PENDING {:?}", value),
            }
        }
    }

    /// Engine configuration, validated
    pub fn upackets_config(&self) -> Result<UPacketsConfig> {
        let config = UPacketsConfig {
            max_fragment_size: self.max_fragment_size,
            max_pending_entries: self.max_pending_entries,
            pending_ttl: self.pending_ttl,
            max_fragments_per_entry: self.max_fragments_per_entry,
        };
        config.validate().context("invalid engine configuration")?;
        Ok(config)
    }
}
