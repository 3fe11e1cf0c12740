//! Functional core for `ormsource`.
//!
//! Pure types and traits shared by the data source and its backends:
//!
//! - [`orm`]: the ORM collaborator contract (entities, lookup/write options,
//!   connection, repository and manager traits, errors).
//! - [`cache`]: the cache store contract, cache key builder, and entity
//!   serialization.

pub mod cache;
pub mod orm;
