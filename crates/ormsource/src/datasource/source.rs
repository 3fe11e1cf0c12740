//! Cache-aside entity accessor.

use std::sync::Arc;
use std::time::Duration;

use ormsource_core::cache::{deserialize_entity, entity_cache_key, serialize_entity, Cache};
use ormsource_core::orm::{
    Connection, Entity, EntityManager, FindOptions, RemoveOptions, Repository, Result,
    SaveOptions,
};

use super::{CacheOptions, DataSourceInit};

/// Data source mediating every entity read and write between resolvers and
/// the ORM.
///
/// Implements the cache-aside pattern for single-entity reads:
/// - **Reads**: Check cache first, on miss fetch from the ORM and populate cache
/// - **Writes**: Delegate to the ORM. The cache is neither updated nor
///   invalidated, so a cached read can be stale for up to the TTL.
///
/// Cache faults never reach the caller: a failed or unreadable cache lookup
/// is a miss and a failed cache write is dropped. ORM errors are returned
/// unchanged.
///
/// # Type Parameters
///
/// * `O` - The ORM connection
/// * `C` - The request context supplied at initialization
pub struct OrmDataSource<O, C = ()>
where
    O: Connection,
{
    orm: Arc<O>,
    cache: Option<Arc<dyn Cache>>,
    use_cache: bool,
    cache_ttl: Duration,
    context: Option<C>,
}

impl<O, C> OrmDataSource<O, C>
where
    O: Connection,
{
    /// Creates a new data source.
    ///
    /// # Arguments
    ///
    /// * `orm` - Shared ORM connection
    /// * `cache` - Cache settings; `None` disables caching permanently
    pub fn new(orm: Arc<O>, cache: Option<CacheOptions>) -> Self {
        Self {
            orm,
            cache: None,
            use_cache: cache.is_some(),
            cache_ttl: cache.unwrap_or_default().ttl,
            context: None,
        }
    }

    /// Binds the request context and, when caching is enabled, the cache.
    ///
    /// The data source never creates a cache of its own. If caching is
    /// enabled and `init.cache` is `None`, reads go straight to the ORM.
    pub fn initialize(&mut self, init: DataSourceInit<C>) {
        self.context = Some(init.context);

        if self.use_cache {
            if init.cache.is_none() {
                tracing::warn!("Caching enabled but no cache supplied, reads will bypass the cache");
            }
            self.cache = init.cache;
        }

        tracing::debug!(
            cache_enabled = self.cache.is_some(),
            ttl_ms = self.cache_ttl.as_millis() as u64,
            "Data source initialized"
        );
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    /// Whether caching was requested at construction.
    pub fn cache_enabled(&self) -> bool {
        self.use_cache
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn manager(&self) -> &O::Manager {
        self.orm.manager()
    }

    pub fn repository<E: Entity>(&self) -> Arc<dyn Repository<E>> {
        self.orm.repository::<E>()
    }

    /// Gets a single entity by id.
    ///
    /// A cached copy is returned when one exists for the exact
    /// `(repository, id, options)` triple. Otherwise the ORM is queried and a
    /// found entity is cached for the configured TTL.
    pub async fn find_one<E: Entity>(&self, id: &E::Id, options: &FindOptions) -> Result<Option<E>> {
        let cache = self.cache.as_deref();
        let key = cache.and_then(|_| cache_key::<E>(id, options));

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if let Some(entity) = self.cache_get::<E>(cache, key).await {
                tracing::trace!(repository = E::REPOSITORY, ?id, "Cache hit");
                return Ok(Some(entity));
            }
            tracing::trace!(repository = E::REPOSITORY, ?id, "Cache miss");
        }

        let entity = self.orm.repository::<E>().find_one(id, options).await?;

        if let (Some(cache), Some(key), Some(entity)) = (cache, key.as_deref(), entity.as_ref()) {
            self.cache_set(cache, key, entity).await;
        }

        Ok(entity)
    }

    /// Gets several entities by id.
    ///
    /// Without a cache this is the ORM's bulk lookup: rows come back in the
    /// ORM's order and missing ids are absent.
    ///
    /// With a cache, `options` are not applied. Every id is looked up in the
    /// cache under its default-options key; cached entities are returned
    /// first, in input order, followed by the remaining ids resolved one at a
    /// time through [`find_one`](Self::find_one) in input order. An id the
    /// ORM does not know yields `None` in its slot.
    pub async fn find_many_by_ids<E: Entity>(
        &self,
        ids: &[E::Id],
        options: &FindOptions,
    ) -> Result<Vec<Option<E>>> {
        let Some(cache) = self.cache.as_deref() else {
            let rows = self.orm.repository::<E>().find_by_ids(ids, options).await?;
            return Ok(rows.into_iter().map(Some).collect());
        };

        let unfiltered = FindOptions::default();
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            let hit = match cache_key::<E>(id, &unfiltered) {
                Some(key) => self.cache_get::<E>(cache, &key).await,
                None => None,
            };
            match hit {
                Some(entity) => found.push(Some(entity)),
                None => missing.push(id),
            }
        }

        tracing::trace!(
            repository = E::REPOSITORY,
            hits = found.len(),
            misses = missing.len(),
            "Bulk cache scan"
        );

        for id in missing {
            found.push(self.find_one(id, &unfiltered).await?);
        }

        Ok(found)
    }

    /// Persists an entity and returns it with ORM-assigned fields populated.
    pub async fn save_one<E: Entity>(&self, entity: E, options: &SaveOptions) -> Result<E> {
        self.orm.manager().save(entity, options).await
    }

    /// Removes an entity and returns the removed representation.
    pub async fn remove_one<E: Entity>(&self, entity: E, options: &RemoveOptions) -> Result<E> {
        self.orm.manager().remove(entity, options).await
    }

    async fn cache_get<E: Entity>(&self, cache: &dyn Cache, key: &str) -> Option<E> {
        match cache.get(key).await {
            Ok(Some(bytes)) => match deserialize_entity(&bytes) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    tracing::warn!(repository = E::REPOSITORY, key, error = %err, "Cache entry deserialization failed");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(repository = E::REPOSITORY, key, error = %err, "Cache read failed");
                None
            }
        }
    }

    async fn cache_set<E: Entity>(&self, cache: &dyn Cache, key: &str, entity: &E) {
        let bytes = match serialize_entity(entity) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(repository = E::REPOSITORY, key, error = %err, "Failed to serialize entity for cache");
                return;
            }
        };

        if let Err(err) = cache.set(key, &bytes, Some(self.cache_ttl)).await {
            tracing::warn!(repository = E::REPOSITORY, key, error = %err, "Failed to cache entity");
        }
    }
}

fn cache_key<E: Entity>(id: &E::Id, options: &FindOptions) -> Option<String> {
    match entity_cache_key(E::REPOSITORY, id, options) {
        Ok(key) => Some(key),
        Err(err) => {
            tracing::warn!(repository = E::REPOSITORY, ?id, error = %err, "Failed to build cache key");
            None
        }
    }
}
