mod error;
pub mod extjson;
mod keys;
mod object_id;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::entity_cache_key;
pub use object_id::{ObjectId, ObjectIdError};
pub use serialization::{deserialize_entity, serialize_entity, SerializationError};
pub use traits::Cache;
