//! In-memory cache of frequently accessed entities.
//!
//! Entries are kept serialized, expire after a fixed eviction interval and
//! the total payload size is bounded. The cache never owns the authoritative
//! copy of anything; a miss always means "ask the next tier".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use alloy::primitives::U256;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::traits::EntityCache;
use crate::types::StakerInfo;

/// Default time after which cached entries are dropped.
pub const DEFAULT_EVICTION: Duration = Duration::from_secs(15 * 60);

/// Default payload budget of the cache in MiB.
pub const DEFAULT_MAX_MIB: u64 = 4096;

/// Default payload budget in bytes, capped at the address space.
pub const DEFAULT_MAX_BYTES: usize = if DEFAULT_MAX_MIB << 20 > usize::MAX as u64 {
    usize::MAX
} else {
    (DEFAULT_MAX_MIB << 20) as usize
};

/// Errors raised when an entity can not be kept in the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The value could not be serialized.
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
    /// A single entry exceeds the whole cache budget.
    #[error("cache entry of {size} bytes exceeds the {limit} bytes budget")]
    EntryTooLarge {
        /// Encoded entry size.
        size: usize,
        /// Cache budget.
        limit: usize,
    },
}

struct CacheEntry {
    data: Vec<u8>,
    inserted: Instant,
}

/// Concurrent, size-bounded, time-evicted cache.
pub struct MemCache {
    entries: DashMap<String, CacheEntry>,
    used_bytes: AtomicUsize,
    eviction: Duration,
    max_bytes: usize,
}

impl MemCache {
    /// Creates a cache with the given eviction interval and payload budget.
    pub fn new(eviction: Duration, max_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            eviction,
            max_bytes,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Relaxed)
    }

    fn push<T: Serialize>(&self, key: String, value: &T) -> Result<(), CacheError> {
        let data = serde_json::to_vec(value)?;
        if data.len() > self.max_bytes {
            return Err(CacheError::EntryTooLarge {
                size: data.len(),
                limit: self.max_bytes,
            });
        }

        self.remove(&key);
        self.make_room(data.len());

        // bytes are counted before the entry becomes visible to removers
        self.used_bytes.fetch_add(data.len(), Ordering::Relaxed);
        let replaced = self.entries.insert(
            key,
            CacheEntry {
                data,
                inserted: Instant::now(),
            },
        );
        if let Some(old) = replaced {
            self.used_bytes.fetch_sub(old.data.len(), Ordering::Relaxed);
        }
        Ok(())
    }

    fn pull<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        {
            let entry = self.entries.get(key)?;
            if entry.inserted.elapsed() < self.eviction {
                return match serde_json::from_slice(&entry.data) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        tracing::warn!(key, error = %err, "undecodable cache entry");
                        None
                    }
                };
            }
        }

        // shard guard must be released before removal
        tracing::trace!(key, "cache entry expired");
        self.remove_if(key, |entry| entry.inserted.elapsed() >= self.eviction);
        None
    }

    fn remove(&self, key: &str) {
        self.remove_if(key, |_| true);
    }

    /// Removes the entry only if it still satisfies `pred` under the shard lock.
    fn remove_if(&self, key: &str, pred: impl FnOnce(&CacheEntry) -> bool) {
        if let Some((_, entry)) = self.entries.remove_if(key, |_, entry| pred(entry)) {
            self.used_bytes.fetch_sub(entry.data.len(), Ordering::Relaxed);
        }
    }

    /// Drops expired entries, then the oldest ones, until `incoming` bytes fit.
    fn make_room(&self, incoming: usize) {
        if self.used_bytes() + incoming <= self.max_bytes {
            return;
        }

        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.inserted.elapsed() >= self.eviction)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &expired {
            self.remove_if(key, |entry| entry.inserted.elapsed() >= self.eviction);
        }

        while self.used_bytes() + incoming > self.max_bytes {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.inserted)
                .map(|entry| (entry.key().clone(), entry.inserted));
            match oldest {
                // a concurrent replacement is newer and survives
                Some((key, inserted)) => self.remove_if(&key, |entry| entry.inserted == inserted),
                None => break,
            }
        }
    }
}

impl Default for MemCache {
    fn default() -> Self {
        Self::new(DEFAULT_EVICTION, DEFAULT_MAX_BYTES)
    }
}

fn staker_info_key(id: U256) -> String {
    format!("sti-{:#x}", id)
}

impl EntityCache for MemCache {
    fn push_staker_info(&self, id: U256, info: &StakerInfo) -> Result<(), CacheError> {
        self.push(staker_info_key(id), info)
    }

    fn pull_staker_info(&self, id: U256) -> Option<StakerInfo> {
        self.pull(&staker_info_key(id))
    }
}
