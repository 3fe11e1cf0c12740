//! In-memory ORM backend for testing.
//!
//! This module provides an in-memory implementation of the ORM traits
//! that stores every repository's rows as JSON values behind an
//! `Arc<RwLock<_>>`. This is useful for testing and development scenarios
//! where persistence is not required.
//!
//! # Example
//!
//! ```rust,ignore
//! use ormsource::storage::inmemory::InMemoryConnection;
//!
//! let orm = Arc::new(InMemoryConnection::new());
//! let saved = orm.manager().save(author, &SaveOptions::default()).await?;
//! ```

mod connection;

pub use connection::{InMemoryConnection, OrmStats};
