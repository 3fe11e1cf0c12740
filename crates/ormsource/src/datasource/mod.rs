//! Cache-aside data source over an ORM connection.
//!
//! One [`OrmDataSource`] is created per request. Reads for a single entity
//! consult the shared cache before the ORM; writes always go to the ORM and
//! leave the cache untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ormsource::config::Config;
//! use ormsource::datasource::{default_cache, DataSourceInit, OrmDataSource};
//!
//! let config = Config::from_env();
//! let cache = default_cache(&config);
//!
//! // per request
//! let mut source = OrmDataSource::new(Arc::clone(&orm), config.cache_options());
//! source.initialize(DataSourceInit::new(ctx).with_cache(Arc::clone(&cache)));
//! let author = source.find_one::<Author>(&42, &FindOptions::default()).await?;
//! ```

mod options;
mod source;

pub use options::{default_cache, CacheOptions, DataSourceInit, DEFAULT_CACHE_TTL};
pub use source::OrmDataSource;
