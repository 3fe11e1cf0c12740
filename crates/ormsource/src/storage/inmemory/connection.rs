//! In-memory ORM connection.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use ormsource_core::cache::extjson;
use ormsource_core::orm::{
    Connection, Entity, EntityManager, FindOptions, RemoveOptions, Repository, RepositoryError,
    Result, SaveOptions, SortOrder,
};

/// Rows of one repository, keyed by the extended JSON text of the id.
type Table = BTreeMap<String, Value>;

/// Counts of ORM operations served by an [`InMemoryConnection`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrmStats {
    pub find_one: usize,
    pub find_by_ids: usize,
    pub save: usize,
    pub remove: usize,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<HashMap<&'static str, Table>>,
    sequence: AtomicU64,
    failure: Mutex<Option<RepositoryError>>,
    find_one_calls: AtomicUsize,
    find_by_ids_calls: AtomicUsize,
    save_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl Shared {
    async fn take_failure(&self) -> Result<()> {
        match self.failure.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn load<E: Entity>(&self, key: &str, options: &FindOptions) -> Result<Option<E>> {
        let tables = self.tables.read().await;
        let Some(row) = tables.get(E::REPOSITORY).and_then(|t| t.get(key)) else {
            return Ok(None);
        };
        if !matches_filter(row, options) {
            return Ok(None);
        }
        decode(project(row, options)).map(Some)
    }
}

/// In-memory ORM backend for development and testing.
///
/// Rows are stored as extended JSON values per repository, so any
/// [`Entity`] can be persisted without schema setup and non-finite doubles
/// read back unchanged. Data is not persisted and is lost when
/// the last clone is dropped.
///
/// Lookups honor `select`, `where` and `order` from [`FindOptions`];
/// `relations` and `with_deleted` are accepted and ignored since rows hold
/// no joins and are never soft-deleted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnection {
    shared: Arc<Shared>,
}

impl InMemoryConnection {
    /// Creates a new empty connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next ORM operation fail with `error`.
    pub async fn fail_next(&self, error: RepositoryError) {
        *self.shared.failure.lock().await = Some(error);
    }

    /// Returns how many operations of each kind have been served.
    pub fn stats(&self) -> OrmStats {
        OrmStats {
            find_one: self.shared.find_one_calls.load(Ordering::SeqCst),
            find_by_ids: self.shared.find_by_ids_calls.load(Ordering::SeqCst),
            save: self.shared.save_calls.load(Ordering::SeqCst),
            remove: self.shared.remove_calls.load(Ordering::SeqCst),
        }
    }

    /// Number of stored rows for entity type `E`.
    pub async fn count<E: Entity>(&self) -> usize {
        self.shared
            .tables
            .read()
            .await
            .get(E::REPOSITORY)
            .map_or(0, BTreeMap::len)
    }
}

impl Connection for InMemoryConnection {
    type Manager = Self;

    fn repository<E: Entity>(&self) -> Arc<dyn Repository<E>> {
        Arc::new(InMemoryRepository::<E> {
            shared: Arc::clone(&self.shared),
            _entity: PhantomData,
        })
    }

    fn manager(&self) -> &Self::Manager {
        self
    }
}

#[async_trait]
impl EntityManager for InMemoryConnection {
    async fn save<E: Entity>(&self, mut entity: E, _options: &SaveOptions) -> Result<E> {
        self.shared.save_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.take_failure().await?;

        let mut tables = self.shared.tables.write().await;
        let table = tables.entry(E::REPOSITORY).or_default();

        let generated = entity.id().is_none();
        if generated {
            // Skip sequence values already taken by explicitly keyed rows.
            loop {
                let seq = self.shared.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                entity.assign_generated_id(seq);
                match entity.id() {
                    Some(id) if table.contains_key(&id_key::<E>(&id)?) => continue,
                    _ => break,
                }
            }
        }
        let id = entity.id().ok_or_else(|| {
            RepositoryError::InvalidData(format!("{} has no primary key", E::REPOSITORY))
        })?;
        let key = id_key::<E>(&id)?;
        let row =
            extjson::to_value(&entity).map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        table.insert(key, row);
        tracing::trace!(repository = E::REPOSITORY, ?id, generated, "Row saved");
        Ok(entity)
    }

    async fn remove<E: Entity>(&self, entity: E, _options: &RemoveOptions) -> Result<E> {
        self.shared.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.take_failure().await?;

        let id = entity.id().ok_or_else(|| {
            RepositoryError::InvalidData(format!("{} has no primary key", E::REPOSITORY))
        })?;
        let key = id_key::<E>(&id)?;

        let mut tables = self.shared.tables.write().await;
        let removed = tables
            .get_mut(E::REPOSITORY)
            .and_then(|table| table.remove(&key));
        if removed.is_none() {
            return Err(RepositoryError::NotFound {
                entity_type: E::REPOSITORY,
                id: key,
            });
        }
        tracing::trace!(repository = E::REPOSITORY, ?id, "Row removed");
        Ok(entity)
    }
}

struct InMemoryRepository<E> {
    shared: Arc<Shared>,
    _entity: PhantomData<fn() -> E>,
}

#[async_trait]
impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    async fn find_one(&self, id: &E::Id, options: &FindOptions) -> Result<Option<E>> {
        self.shared.find_one_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.take_failure().await?;

        let key = id_key::<E>(id)?;
        self.shared.load(&key, options).await
    }

    async fn find_by_ids(&self, ids: &[E::Id], options: &FindOptions) -> Result<Vec<E>> {
        self.shared.find_by_ids_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.take_failure().await?;

        let tables = self.shared.tables.read().await;
        let Some(table) = tables.get(E::REPOSITORY) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let key = id_key::<E>(id)?;
            if let Some(row) = table.get(&key).filter(|row| matches_filter(row, options)) {
                rows.push(row);
            }
        }
        rows.sort_by(|a, b| compare_rows(a, b, &options.order));

        rows.into_iter()
            .map(|row| decode(project(row, options)))
            .collect()
    }
}

fn id_key<E: Entity>(id: &E::Id) -> Result<String> {
    extjson::to_string(id).map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

fn decode<E: Entity>(row: Value) -> Result<E> {
    extjson::from_value(row).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn matches_filter(row: &Value, options: &FindOptions) -> bool {
    options
        .filter
        .iter()
        .all(|(column, expected)| row.get(column) == Some(expected))
}

/// Keeps only the selected columns; all of them when `select` is empty.
fn project(row: &Value, options: &FindOptions) -> Value {
    match row {
        Value::Object(columns) if !options.select.is_empty() => Value::Object(
            columns
                .iter()
                .filter(|(name, _)| options.select.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        ),
        _ => row.clone(),
    }
}

fn compare_rows(a: &Value, b: &Value, order: &[(String, SortOrder)]) -> CmpOrdering {
    for (column, direction) in order {
        let ordering = compare_values(a.get(column), b.get(column));
        let ordering = match direction {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    CmpOrdering::Equal
}

/// Orders missing < null < bool < number < string; other values tie.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        #[serde(default)]
        title: String,
        #[serde(default)]
        year: u32,
    }

    impl Entity for Book {
        type Id = u64;
        const REPOSITORY: &'static str = "book";

        fn id(&self) -> Option<u64> {
            self.id
        }

        fn assign_generated_id(&mut self, seq: u64) {
            self.id = Some(seq);
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        name: String,
    }

    impl Entity for Tag {
        type Id = String;
        const REPOSITORY: &'static str = "tag";

        fn id(&self) -> Option<String> {
            Some(self.name.clone())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Draft {
        body: String,
    }

    impl Entity for Draft {
        type Id = u64;
        const REPOSITORY: &'static str = "draft";

        fn id(&self) -> Option<u64> {
            None
        }
    }

    fn book(title: &str, year: u32) -> Book {
        Book {
            id: None,
            title: title.to_string(),
            year,
        }
    }

    async fn seed(conn: &InMemoryConnection) -> Vec<Book> {
        let mut saved = Vec::new();
        for (title, year) in [("Dune", 1965), ("Solaris", 1961), ("Neuromancer", 1984)] {
            saved.push(
                conn.manager()
                    .save(book(title, year), &SaveOptions::default())
                    .await
                    .unwrap(),
            );
        }
        saved
    }

    #[tokio::test]
    async fn test_save_assigns_generated_ids() {
        let conn = InMemoryConnection::new();
        let saved = seed(&conn).await;

        let ids: Vec<_> = saved.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(conn.count::<Book>().await, 3);
    }

    #[tokio::test]
    async fn test_save_with_id_upserts() {
        let conn = InMemoryConnection::new();
        let mut dune = conn
            .manager()
            .save(book("Dune", 1965), &SaveOptions::default())
            .await
            .unwrap();

        dune.title = "Dune Messiah".to_string();
        conn.manager()
            .save(dune.clone(), &SaveOptions::default())
            .await
            .unwrap();

        let found = conn
            .repository::<Book>()
            .find_one(&1, &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(found, Some(dune));
        assert_eq!(conn.count::<Book>().await, 1);
    }

    #[tokio::test]
    async fn test_generated_ids_skip_explicit_keys() {
        let conn = InMemoryConnection::new();
        for id in [1, 2] {
            conn.manager()
                .save(
                    Book {
                        id: Some(id),
                        title: format!("Explicit {id}"),
                        year: 2000,
                    },
                    &SaveOptions::default(),
                )
                .await
                .unwrap();
        }

        let fresh = conn
            .manager()
            .save(book("Hyperion", 1989), &SaveOptions::default())
            .await
            .unwrap();

        assert_eq!(fresh.id, Some(3));
        assert_eq!(conn.count::<Book>().await, 3);
        let first = conn
            .repository::<Book>()
            .find_one(&1, &FindOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.title, "Explicit 1");
    }

    #[tokio::test]
    async fn test_save_without_primary_key_fails() {
        let conn = InMemoryConnection::new();
        let result = conn
            .manager()
            .save(
                Draft {
                    body: "untitled".to_string(),
                },
                &SaveOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_find_one_missing() {
        let conn = InMemoryConnection::new();
        seed(&conn).await;

        let found = conn
            .repository::<Book>()
            .find_one(&99, &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_repositories_are_isolated() {
        let conn = InMemoryConnection::new();
        conn.manager()
            .save(
                Tag {
                    name: "1".to_string(),
                },
                &SaveOptions::default(),
            )
            .await
            .unwrap();

        let books = conn
            .repository::<Book>()
            .find_by_ids(&[1], &FindOptions::default())
            .await
            .unwrap();
        assert!(books.is_empty());

        let tag = conn
            .repository::<Tag>()
            .find_one(&"1".to_string(), &FindOptions::default())
            .await
            .unwrap();
        assert!(tag.is_some());
    }

    #[tokio::test]
    async fn test_find_one_select_projects_columns() {
        let conn = InMemoryConnection::new();
        seed(&conn).await;

        let found = conn
            .repository::<Book>()
            .find_one(&1, &FindOptions::new().with_select(["id", "title"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "Dune");
        assert_eq!(found.year, 0);
    }

    #[tokio::test]
    async fn test_find_one_filter() {
        let conn = InMemoryConnection::new();
        seed(&conn).await;
        let repo = conn.repository::<Book>();

        let hit = repo
            .find_one(&1, &FindOptions::new().with_filter("year", 1965))
            .await
            .unwrap();
        let miss = repo
            .find_one(&1, &FindOptions::new().with_filter("year", 1966))
            .await
            .unwrap();

        assert!(hit.is_some());
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_find_by_ids_keeps_input_order_and_skips_missing() {
        let conn = InMemoryConnection::new();
        seed(&conn).await;

        let books = conn
            .repository::<Book>()
            .find_by_ids(&[3, 42, 1], &FindOptions::default())
            .await
            .unwrap();
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Neuromancer", "Dune"]);
    }

    #[tokio::test]
    async fn test_find_by_ids_order() {
        let conn = InMemoryConnection::new();
        seed(&conn).await;
        let repo = conn.repository::<Book>();

        let asc = repo
            .find_by_ids(&[1, 2, 3], &FindOptions::new().with_order("year", SortOrder::Asc))
            .await
            .unwrap();
        let years: Vec<_> = asc.iter().map(|b| b.year).collect();
        assert_eq!(years, vec![1961, 1965, 1984]);

        let desc = repo
            .find_by_ids(
                &[1, 2, 3],
                &FindOptions::new().with_order("title", SortOrder::Desc),
            )
            .await
            .unwrap();
        let titles: Vec<_> = desc.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Solaris", "Neuromancer", "Dune"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let conn = InMemoryConnection::new();
        let saved = seed(&conn).await;

        let removed = conn
            .manager()
            .remove(saved[0].clone(), &RemoveOptions::default())
            .await
            .unwrap();
        assert_eq!(removed, saved[0]);
        assert_eq!(conn.count::<Book>().await, 2);

        let again = conn
            .manager()
            .remove(saved[0].clone(), &RemoveOptions::default())
            .await;
        assert_eq!(
            again,
            Err(RepositoryError::NotFound {
                entity_type: "book",
                id: "1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let conn = InMemoryConnection::new();
        seed(&conn).await;
        let repo = conn.repository::<Book>();

        conn.fail_next(RepositoryError::ConnectionFailed("gone".to_string()))
            .await;

        let first = repo.find_one(&1, &FindOptions::default()).await;
        assert_eq!(
            first,
            Err(RepositoryError::ConnectionFailed("gone".to_string()))
        );

        let second = repo.find_one(&1, &FindOptions::default()).await;
        assert!(second.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats_count_operations() {
        let conn = InMemoryConnection::new();
        let saved = seed(&conn).await;
        let repo = conn.repository::<Book>();

        repo.find_one(&1, &FindOptions::default()).await.unwrap();
        repo.find_by_ids(&[1, 2], &FindOptions::default())
            .await
            .unwrap();
        conn.manager()
            .remove(saved[2].clone(), &RemoveOptions::default())
            .await
            .unwrap();

        assert_eq!(
            conn.stats(),
            OrmStats {
                find_one: 1,
                find_by_ids: 1,
                save: 3,
                remove: 1,
            }
        );
    }

    #[test]
    fn test_compare_values_ranks() {
        let n = Value::from(1);
        let s = Value::from("a");
        assert_eq!(compare_values(None, Some(&n)), CmpOrdering::Less);
        assert_eq!(compare_values(Some(&s), Some(&n)), CmpOrdering::Greater);
        assert_eq!(
            compare_values(Some(&Value::from(2.5)), Some(&Value::from(2))),
            CmpOrdering::Greater
        );
    }
}
