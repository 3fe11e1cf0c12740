mod error;
mod graphql_mapping;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use graphql_mapping::repository_error_code;
pub use traits::{Connection, EntityManager, Repository};
pub use types::{Entity, FindOptions, RemoveOptions, SaveOptions, SortOrder};
