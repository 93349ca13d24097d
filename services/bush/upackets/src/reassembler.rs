//! Reassembly of fragments into verified packets.
//!
//! Entries live in a [`DashMap`] keyed by [`CorrelationId`], so every
//! mutation of one packet's entry is serialized by its shard lock while
//! unrelated packets proceed independently. An entry is created by the first
//! fragment of either kind and removed the moment it completes, expires, or
//! is evicted to make room.
//!
//! The header fragment arrives under a provisional id. Once decrypted, it is
//! moved onto the canonical id its body fragments already use via
//! [`Reassembler::attach_header`].

use crate::config::UPacketsConfig;
use crate::error::ReassemblyError;
use crate::fragment::{CorrelationId, Fragment};
use crate::scheme::{BodyOpener, EncryptionScheme};
use crate::UPacketsError;
use bush_crypto::{ecies, KeyPair, SymmetricKey};
use bush_wire::{authenticate_header, HeaderSummary, Packet};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Resolves the symmetric body key for a sender, by master address as
/// lowercase hex without `0x`
pub trait BodyKeyLookup {
    /// Key shared with `master_address`, if known
    fn body_key(&self, master_address: &str) -> Option<SymmetricKey>;
}

impl<F> BodyKeyLookup for F
where
    F: Fn(&str) -> Option<SymmetricKey>,
{
    fn body_key(&self, master_address: &str) -> Option<SymmetricKey> {
        self(master_address)
    }
}

impl BodyKeyLookup for HashMap<String, SymmetricKey> {
    fn body_key(&self, master_address: &str) -> Option<SymmetricKey> {
        self.get(master_address).cloned()
    }
}

/// Lookup for peers that never use the symmetric scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBodyKeys;

impl BodyKeyLookup for NoBodyKeys {
    fn body_key(&self, _master_address: &str) -> Option<SymmetricKey> {
        None
    }
}

/// Decrypted header waiting for its body
struct PendingHeader {
    bytes: Bytes,
    summary: HeaderSummary,
    timestamp: u64,
}

struct Entry {
    created: Instant,
    header: Option<PendingHeader>,
    fragments: BTreeMap<u32, Bytes>,
}

impl Entry {
    fn new() -> Self {
        Self {
            created: Instant::now(),
            header: None,
            fragments: BTreeMap::new(),
        }
    }

    fn is_complete(&self) -> bool {
        match &self.header {
            Some(header) => self.fragments.len() == header.summary.fragment_count as usize,
            None => false,
        }
    }

    fn body_ciphertext(&self) -> Vec<u8> {
        let size = self.fragments.values().map(Bytes::len).sum();
        let mut body = Vec::with_capacity(size);
        for chunk in self.fragments.values() {
            body.extend_from_slice(chunk);
        }
        body
    }
}

/// Reassembly store for one engine instance
pub struct Reassembler {
    entries: DashMap<CorrelationId, Entry>,
    config: UPacketsConfig,
}

impl Reassembler {
    /// Create an empty store
    pub fn new(config: UPacketsConfig) -> Result<Self, UPacketsError> {
        config.validate()?;
        Ok(Self {
            entries: DashMap::new(),
            config,
        })
    }

    /// Number of incomplete entries
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Drop entries older than the configured TTL, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.pending_ttl;
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = entry.created.elapsed() < ttl;
            if !keep {
                debug!("expired pending entry {}", key);
            }
            keep
        });
        before.saturating_sub(self.entries.len())
    }

    /// Feed one received fragment. Returns the packet once its last fragment
    /// arrives, `None` while it is still incomplete.
    pub fn feed<L>(
        &self,
        bytes: &[u8],
        header_key: &KeyPair,
        lookup: &L,
    ) -> Result<Option<Packet>, UPacketsError>
    where
        L: BodyKeyLookup + ?Sized,
    {
        let fragment = Fragment::decode(bytes)?;
        let key = if fragment.is_header() {
            self.attach_header(&fragment, header_key)?
        } else {
            self.attach_body(fragment)?
        };
        self.try_complete(&key, header_key, lookup)
    }

    /// Decrypt a header fragment and file it under its canonical id,
    /// joining any body fragments already waiting there.
    pub fn attach_header(
        &self,
        fragment: &Fragment,
        header_key: &KeyPair,
    ) -> Result<CorrelationId, UPacketsError> {
        let provisional = fragment.correlation;
        let timestamp = u64::from_be_bytes(*provisional.id());

        let bytes =
            ecies::decrypt(header_key, &fragment.payload).map_err(ReassemblyError::HeaderDecrypt)?;
        let summary = authenticate_header(&bytes, timestamp).map_err(|e| {
            warn!("rejecting header {}: {}", provisional, e);
            e
        })?;
        let count = summary.fragment_count;
        if count as usize > self.config.max_fragments_per_entry {
            return Err(ReassemblyError::TooManyFragments(self.config.max_fragments_per_entry).into());
        }

        let key = CorrelationId::canonical(provisional.scheme(), timestamp, &summary.master_address);
        trace!("header {} rekeyed to {}", provisional, key);

        self.ensure_entry(key);
        let mut entry = self.entries.entry(key).or_insert_with(Entry::new);
        if entry.header.is_some() {
            trace!("duplicate header fragment for {}", key);
            return Ok(key);
        }

        let stray = entry.fragments.split_off(&count.saturating_add(1));
        if !stray.is_empty() {
            warn!(
                "discarding {} fragments of {} beyond declared count {}",
                stray.len(),
                key,
                count
            );
        }

        entry.header = Some(PendingHeader {
            bytes: Bytes::from(bytes),
            summary,
            timestamp,
        });
        Ok(key)
    }

    fn attach_body(&self, fragment: Fragment) -> Result<CorrelationId, UPacketsError> {
        let key = fragment.correlation;
        self.ensure_entry(key);
        let mut entry = self.entries.entry(key).or_insert_with(Entry::new);

        if let Some(header) = &entry.header {
            let count = header.summary.fragment_count;
            if fragment.index > count {
                return Err(ReassemblyError::FragmentIndex {
                    index: fragment.index,
                    count,
                }
                .into());
            }
        }
        if entry.fragments.contains_key(&fragment.index) {
            trace!("duplicate fragment {} for {}", fragment.index, key);
            return Ok(key);
        }
        if entry.fragments.len() >= self.config.max_fragments_per_entry {
            return Err(ReassemblyError::TooManyFragments(self.config.max_fragments_per_entry).into());
        }

        entry.fragments.insert(fragment.index, fragment.payload);
        Ok(key)
    }

    /// Complete the entry under `key` if every fragment has arrived.
    ///
    /// A missing symmetric body key leaves the entry untouched, so this can
    /// be called again once the key is known. Any other failure consumes
    /// the entry.
    pub fn try_complete<L>(
        &self,
        key: &CorrelationId,
        header_key: &KeyPair,
        lookup: &L,
    ) -> Result<Option<Packet>, UPacketsError>
    where
        L: BodyKeyLookup + ?Sized,
    {
        let summary = match self.entries.get(key) {
            Some(entry) if entry.is_complete() => match &entry.header {
                Some(header) => header.summary,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        let opener = if summary.kind.carries_body() && summary.fragment_count > 0 {
            Some(match key.scheme() {
                EncryptionScheme::Ec => BodyOpener::Ec(header_key),
                EncryptionScheme::Symmetric => {
                    let master = summary.master_address.to_hex();
                    match lookup.body_key(&master) {
                        Some(body_key) => BodyOpener::Symmetric(body_key),
                        None => {
                            warn!("no body key for {}, keeping {}", master, key);
                            return Err(ReassemblyError::MissingBodyKey {
                                master_address: master,
                                correlation: *key,
                            }
                            .into());
                        }
                    }
                }
                EncryptionScheme::None => BodyOpener::None,
            })
        } else {
            None
        };

        let Some((_, entry)) = self.entries.remove_if(key, |_, entry| entry.is_complete()) else {
            return Ok(None);
        };
        let Some(header) = &entry.header else {
            return Ok(None);
        };

        let body = match opener {
            Some(opener) => Some(opener.decrypt(&entry.body_ciphertext())?),
            None => None,
        };
        let packet = Packet::parse(&header.bytes, body.as_deref(), header.timestamp)?;

        debug!(
            "reassembled {} packet from {} ({} body fragments)",
            packet.kind(),
            key,
            entry.fragments.len()
        );
        Ok(Some(packet))
    }

    /// Make room for `key` if it is not already pending
    fn ensure_entry(&self, key: CorrelationId) {
        let fresh = self
            .entries
            .get(&key)
            .map(|entry| entry.created.elapsed() < self.config.pending_ttl);
        match fresh {
            Some(true) => return,
            Some(false) => {
                self.entries.remove(&key);
                debug!("expired pending entry {}", key);
            }
            None => {}
        }

        self.purge_expired();
        while self.entries.len() >= self.config.max_pending_entries {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().created)
            .map(|entry| *entry.key());

        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                debug!("evicted pending entry {} to stay within bounds", key);
                true
            }
            None => false,
        }
    }
}
