use thiserror::Error;

/// Error taxonomy surfaced by the identity and entitlement services.
///
/// Auth failures (wrong password, unknown/expired token) are deliberately
/// *values* (`None` / `false`) rather than errors, so they never appear here.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing or malformed input; `code` is a stable string the HTTP
    /// layer returns verbatim (e.g. `no-uid`, `invalid-code`).
    #[error("validation failed: {code}")]
    Validation { code: &'static str },

    #[error("not found")]
    NotFound,

    /// Duplicate email on create/update.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Connection/timeout class failures - safe to retry at the caller.
    #[error("storage temporarily unavailable: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(code: &'static str) -> Self {
        Self::Validation { code }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => ServiceError::Transient(err),
            _ => ServiceError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_carries_code() {
        let err = ServiceError::validation("no-uid");
        assert_eq!(err.to_string(), "validation failed: no-uid");
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let err = ServiceError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_row_not_found_is_not_retryable() {
        let err = ServiceError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_retryable());
        assert!(matches!(err, ServiceError::Database(_)));
    }
}
