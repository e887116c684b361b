//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
///
/// Only [`StorageError::ConnectionFailed`] ever reaches callers of
/// [`PlayerStorage`](super::PlayerStorage); every other variant is logged
/// and collapsed into a default return value there.
#[derive(Debug)]
pub enum StorageError {
    /// A session could not be established (unreachable host, bad
    /// credentials, schema setup failure)
    ConnectionFailed(String),

    /// No live session exists, even after a reconnect attempt
    Unavailable,

    /// A query or command failed on a live session
    QueryFailed(String),

    /// The backend does not implement this operation
    Unsupported(&'static str),

    /// Record serialization/deserialization error
    SerializationError(String),

    /// Invalid configuration
    InvalidConfig(String),

    /// Player identifier that cannot be stored without being altered
    InvalidPlayerId(String),
}

impl StorageError {
    /// Whether this error is about the session rather than the data
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionFailed(_) | StorageError::Unavailable
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to storage backend: {}", msg)
            }
            StorageError::Unavailable => write!(f, "storage backend unavailable: no live session"),
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
            StorageError::Unsupported(op) => {
                write!(f, "operation not supported by this backend: {}", op)
            }
            StorageError::SerializationError(msg) => {
                write!(f, "record serialization error: {}", msg)
            }
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage configuration: {}", msg),
            StorageError::InvalidPlayerId(id) => {
                write!(f, "invalid player id {:?}: expected 1-36 characters", id)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "relational")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::QueryFailed("no rows found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StorageError::Unavailable,
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

#[cfg(feature = "document")]
impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}
