use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// A persisted entity type.
///
/// `REPOSITORY` is the stable name of the entity's repository. It scopes
/// cache keys, so two entity types must never share one.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Primary key type.
    type Id: Serialize + Clone + fmt::Debug + Send + Sync + 'static;

    const REPOSITORY: &'static str;

    /// Returns the primary key, or `None` for an entity not yet inserted.
    fn id(&self) -> Option<Self::Id>;

    /// Stores a backend-generated primary key.
    ///
    /// Entities whose keys are always supplied by the caller can keep the
    /// default, which ignores the value.
    fn assign_generated_id(&mut self, _seq: u64) {}
}

/// Sort direction for an ordered lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Options for repository lookups.
///
/// Options can change which fields of an entity are populated (`select`,
/// `relations`), so they take part in the cache key. Every field is omitted
/// from the serialized form when empty, which makes `FindOptions::default()`
/// serialize to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    /// Columns to load. Empty means all columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
    /// Relations to join and populate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<String>,
    /// Additional equality conditions, by column.
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<(String, Value)>,
    /// Ordering, most significant column first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<(String, SortOrder)>,
    /// Include soft-deleted rows.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub with_deleted: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(relations.into_iter().map(Into::into));
        self
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.push((column.into(), value.into()));
        self
    }

    pub fn with_order(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }
}

/// Options for saving an entity, passed through to the ORM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOptions {
    /// Run entity listeners and subscribers.
    pub listeners: bool,
    /// Wrap the save in a transaction.
    pub transaction: bool,
    /// Reload generated columns after the write.
    pub reload: bool,
    /// Split bulk saves into chunks of this size.
    pub chunk: Option<usize>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            listeners: true,
            transaction: true,
            reload: true,
            chunk: None,
        }
    }
}

/// Options for removing an entity, passed through to the ORM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOptions {
    /// Run entity listeners and subscribers.
    pub listeners: bool,
    /// Wrap the removal in a transaction.
    pub transaction: bool,
    /// Split bulk removals into chunks of this size.
    pub chunk: Option<usize>,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            listeners: true,
            transaction: true,
            chunk: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_find_options_serialize_empty() {
        let json = serde_json::to_string(&FindOptions::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_find_options_builder() {
        let options = FindOptions::new()
            .with_select(["id", "name"])
            .with_relations(["books"])
            .with_filter("active", true)
            .with_order("name", SortOrder::Desc)
            .with_deleted(true);

        assert_eq!(options.select, vec!["id", "name"]);
        assert_eq!(options.relations, vec!["books"]);
        assert_eq!(options.filter, vec![("active".to_string(), Value::Bool(true))]);
        assert_eq!(options.order, vec![("name".to_string(), SortOrder::Desc)]);
        assert!(options.with_deleted);
    }

    #[test]
    fn test_find_options_json_shape() {
        let options = FindOptions::new()
            .with_filter("age", 30)
            .with_order("name", SortOrder::Asc)
            .with_deleted(true);

        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(
            json,
            r#"{"where":[["age",30]],"order":[["name","ASC"]],"withDeleted":true}"#
        );
    }

    #[test]
    fn test_find_options_deserialize_partial() {
        let options: FindOptions = serde_json::from_str(r#"{"relations":["books"]}"#).unwrap();
        assert_eq!(options, FindOptions::new().with_relations(["books"]));
    }

    #[test]
    fn test_write_option_defaults() {
        let save = SaveOptions::default();
        assert!(save.listeners && save.transaction && save.reload);
        assert_eq!(save.chunk, None);

        let remove = RemoveOptions::default();
        assert!(remove.listeners && remove.transaction);
        assert_eq!(remove.chunk, None);
    }
}
