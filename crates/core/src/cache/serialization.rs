//! Pure functions for serializing/deserializing entities to/from cache bytes.
//!
//! Entities are stored as extended JSON text. It stays human-readable like
//! plain JSON, but non-finite doubles and wide integers read back exactly
//! instead of collapsing to `null` or losing precision.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use super::extjson;

/// Errors that can occur during cache serialization/deserialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Failed to serialize a value to bytes.
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    /// Failed to deserialize bytes to a value.
    #[error("Failed to deserialize: {0}")]
    DeserializeFailed(String),
}

/// Result type for serialization operations.
pub type Result<T> = std::result::Result<T, SerializationError>;

/// Serializes an entity to extended JSON bytes.
pub fn serialize_entity<E: Serialize>(entity: &E) -> Result<Vec<u8>> {
    extjson::to_string(entity)
        .map(String::into_bytes)
        .map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Deserializes extended JSON bytes to an entity.
///
/// Empty input is rejected like any other malformed value, so a blank cache
/// entry never reads back as an entity.
pub fn deserialize_entity<E: DeserializeOwned>(bytes: &[u8]) -> Result<E> {
    extjson::from_slice(bytes).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}
