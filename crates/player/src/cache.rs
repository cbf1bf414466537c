// Fixed-capacity LRU cache of decoded sounds, keyed by file path

use keyclack_core::{KeyclackError, PcmData, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Thread-safe LRU of decoded sounds.
///
/// Every access takes the lock only long enough to look up, promote, or
/// insert; the returned [`PcmData`] shares its buffer, so callers play it
/// without holding the lock.
pub struct SoundCache {
    entries: Mutex<LruCache<PathBuf, PcmData>>,
}

impl SoundCache {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            KeyclackError::InvalidConfig("Cache size must be at least 1".to_string())
        })?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Look up `path`, marking it most recently used on a hit
    pub fn get(&self, path: &Path) -> Option<PcmData> {
        self.entries.lock().get(path).cloned()
    }

    /// Insert as most recently used, returning the path evicted to make room
    pub fn insert(&self, path: PathBuf, data: PcmData) -> Option<PathBuf> {
        let mut entries = self.entries.lock();
        match entries.push(path.clone(), data) {
            Some((evicted, _)) if evicted != path => {
                log::debug!("Evicted {} from sound cache", evicted.display());
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Membership test that leaves recency untouched
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().contains(path)
    }

    /// Cached paths from least to most recently used
    pub fn keys(&self) -> Vec<PathBuf> {
        self.entries
            .lock()
            .iter()
            .rev()
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
