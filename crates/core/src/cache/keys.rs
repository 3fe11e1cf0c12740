use serde::Serialize;

use super::extjson;

#[derive(Serialize)]
struct EntityKey<'a, I: ?Sized, O: ?Sized> {
    #[serde(rename = "repoName")]
    repo_name: &'a str,
    id: &'a I,
    options: &'a O,
}

/// Returns the cache key for a single-entity lookup.
///
/// The key is the canonical extended JSON text of
/// `{"id": .., "options": .., "repoName": ..}`, so the same lookup always
/// yields the same key and lookups differing in any part never share one.
///
/// # Examples
///
/// ```
/// use ormsource_core::cache::entity_cache_key;
/// use ormsource_core::orm::FindOptions;
///
/// let key = entity_cache_key("author", &42u64, &FindOptions::default()).unwrap();
/// assert_eq!(key, r#"{"id":42,"options":{},"repoName":"author"}"#);
/// ```
pub fn entity_cache_key<I, O>(repository: &str, id: &I, options: &O) -> extjson::Result<String>
where
    I: Serialize + ?Sized,
    O: Serialize + ?Sized,
{
    extjson::to_string(&EntityKey {
        repo_name: repository,
        id,
        options,
    })
}
