//! Cache backend implementations.
//!
//! This module provides concrete implementations of the
//! `ormsource_core::cache::Cache` trait.

pub mod memory;

pub use memory::MemoryCache;
