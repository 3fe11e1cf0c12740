use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Key-value store backing the entity cache.
///
/// Values are opaque byte strings. Implementations decide how `ttl` is
/// enforced, but an entry must never be returned after its TTL has elapsed.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;
}
