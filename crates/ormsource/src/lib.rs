//! Cache-aside entity access for GraphQL resolvers.
//!
//! - [`datasource`]: the per-request [`OrmDataSource`](datasource::OrmDataSource)
//! - [`cache`]: cache backends
//! - [`storage`]: ORM backends
//! - [`config`]: environment configuration

pub mod cache;
pub mod config;
pub mod datasource;
pub mod storage;
