//! ORM backend implementations.
//!
//! Production deployments plug their own `ormsource_core::orm::Connection`
//! into the data source; this module ships the in-memory backend used by
//! the probe binary and tests.

pub mod inmemory;

pub use inmemory::{InMemoryConnection, OrmStats};
