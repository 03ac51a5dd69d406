//! Domain errors for the CipherSwarm control plane.

use thiserror::Error;

/// Domain-level errors. The API layer owns the mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("hash not present in target hash list")]
    HashNotFound,

    #[error("invalid {entity} transition: event {event} not allowed in state {from}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        event: &'static str,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed")]
    AuthFailure,

    #[error("concurrency conflict: {entity} {id} was modified")]
    Conflict { entity: &'static str, id: i64 },

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("dependency unavailable: {0}")]
    Dependency(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether a caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Timeout(_))
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(err.to_string())
    }
}
