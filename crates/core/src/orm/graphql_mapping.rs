//! Pure functions for mapping repository errors to GraphQL error codes.
//!
//! Resolvers put the returned code in the `extensions.code` field of the
//! GraphQL error so that clients can branch on the failure kind.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to a GraphQL error code:
///
/// - `NotFound` -> `NOT_FOUND`
/// - `AlreadyExists`, `ConstraintViolation` -> `CONFLICT`
/// - `ConnectionFailed` -> `SERVICE_UNAVAILABLE`
/// - `QueryFailed`, `Serialization` -> `INTERNAL_SERVER_ERROR`
/// - `InvalidData` -> `BAD_USER_INPUT`
///
/// # Examples
///
/// ```
/// use ormsource_core::orm::{repository_error_code, RepositoryError};
///
/// let error = RepositoryError::NotFound {
///     entity_type: "author",
///     id: "42".to_string(),
/// };
/// assert_eq!(repository_error_code(&error), "NOT_FOUND");
/// ```
pub fn repository_error_code(error: &RepositoryError) -> &'static str {
    match error {
        RepositoryError::NotFound { .. } => "NOT_FOUND",
        RepositoryError::AlreadyExists { .. } => "CONFLICT",
        RepositoryError::ConstraintViolation(_) => "CONFLICT",
        RepositoryError::ConnectionFailed(_) => "SERVICE_UNAVAILABLE",
        RepositoryError::QueryFailed(_) => "INTERNAL_SERVER_ERROR",
        RepositoryError::Serialization(_) => "INTERNAL_SERVER_ERROR",
        RepositoryError::InvalidData(_) => "BAD_USER_INPUT",
    }
}
