use std::sync::Arc;

use async_trait::async_trait;

use super::{Entity, FindOptions, RemoveOptions, Result, SaveOptions};

/// Read access to the rows of one entity type.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Gets a single entity by primary key.
    async fn find_one(&self, id: &E::Id, options: &FindOptions) -> Result<Option<E>>;

    /// Gets every entity whose primary key is in `ids`.
    ///
    /// Missing ids are skipped, so the result may be shorter than `ids`.
    async fn find_by_ids(&self, ids: &[E::Id], options: &FindOptions) -> Result<Vec<E>>;
}

/// Write access shared by every entity type.
#[async_trait]
pub trait EntityManager: Send + Sync {
    /// Inserts or updates an entity and returns it with generated fields set.
    async fn save<E: Entity>(&self, entity: E, options: &SaveOptions) -> Result<E>;

    /// Deletes an entity and returns the removed representation.
    async fn remove<E: Entity>(&self, entity: E, options: &RemoveOptions) -> Result<E>;
}

/// An open ORM connection.
///
/// The connection's lifetime is managed by whoever opened it; data sources
/// only hold a shared handle.
pub trait Connection: Send + Sync + 'static {
    type Manager: EntityManager;

    /// Returns the repository for entity type `E`.
    fn repository<E: Entity>(&self) -> Arc<dyn Repository<E>>;

    /// Returns the entity manager.
    fn manager(&self) -> &Self::Manager;
}
