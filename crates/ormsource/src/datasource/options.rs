use std::sync::Arc;
use std::time::Duration;

use ormsource_core::cache::Cache;

use crate::cache::MemoryCache;
use crate::config::Config;

/// TTL applied when caching is enabled without an explicit duration.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Construction-time cache settings.
///
/// Passing `Some(CacheOptions)` to [`OrmDataSource::new`](super::OrmDataSource::new)
/// enables caching; `None` disables it for the lifetime of the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Duration,
}

impl CacheOptions {
    pub fn from_millis(milliseconds: u64) -> Self {
        Self {
            ttl: Duration::from_millis(milliseconds),
        }
    }

    pub fn from_secs(seconds: u64) -> Self {
        Self {
            ttl: Duration::from_secs(seconds),
        }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Request-time initialization: the request context and the shared cache.
pub struct DataSourceInit<C> {
    pub context: C,
    pub cache: Option<Arc<dyn Cache>>,
}

impl<C> DataSourceInit<C> {
    pub fn new(context: C) -> Self {
        Self {
            context,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Builds the process-wide default cache.
///
/// Call this once at startup and hand clones of the returned `Arc` to every
/// data source; each call creates an independent store. A
/// `cache_max_entries` of 0 is raised to 1.
pub fn default_cache(config: &Config) -> Arc<dyn Cache> {
    Arc::new(MemoryCache::new(config.cache_max_entries.max(1)))
}
