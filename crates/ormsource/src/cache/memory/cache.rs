//! Process-local entity cache.
//!
//! Entries live in a bounded LRU map guarded by a tokio `RwLock`. Each entry
//! carries its own deadline; a read that finds a lapsed entry drops it and
//! reports a miss.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use ormsource_core::cache::{Cache, Result};

#[derive(Debug, Clone)]
struct Slot {
    bytes: Vec<u8>,
    deadline: Option<Instant>,
}

impl Slot {
    fn lapsed(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }
}

/// LRU-bounded in-memory [`Cache`].
///
/// Clones share the same map, so one instance created at startup can back
/// every data source in the process. Once `capacity` entries are stored, the
/// least recently read or written entry is evicted to make room.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    slots: Arc<RwLock<LruCache<String, Slot>>>,
}

impl MemoryCache {
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be non-zero");
        Self {
            slots: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of stored entries, lapsed ones included until they are read.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Write lock: a hit promotes the entry in LRU order.
        let mut slots = self.slots.write().await;

        match slots.get(key) {
            None => Ok(None),
            Some(slot) if !slot.lapsed(Instant::now()) => Ok(Some(slot.bytes.clone())),
            Some(_) => {
                slots.pop(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let slot = Slot {
            bytes: value.to_vec(),
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.slots.write().await.put(key.to_owned(), slot);
        Ok(())
    }
}
