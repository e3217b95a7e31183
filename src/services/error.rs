//! Service error type
//!
//! Every service returns `ServiceError`. Messages in `InvalidInput`,
//! `NotFound` and `Failed` are shown to the user verbatim; the underlying
//! cause of a `Failed` error is logged where it is created and never leaves
//! the server.

/// Errors returned by the business services
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The actor may not perform this action
    #[error("Unauthorized")]
    Unauthorized,

    /// The request failed validation
    #[error("{0}")]
    InvalidInput(String),

    /// The target row does not exist
    #[error("{0}")]
    NotFound(String),

    /// Too many requests; retry after the given number of seconds
    #[error("Too many requests. Please try again in {retry_after} seconds.")]
    RateLimited { retry_after: i64 },

    /// Storage or delivery failed
    #[error("{0}")]
    Failed(String),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Log `source` and hide it behind a fixed user-facing message
    pub fn failed(message: &str, source: anyhow::Error) -> Self {
        tracing::error!("{}: {:#}", message, source);
        Self::Failed(message.to_string())
    }
}

/// Result type used by the services
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Extension for turning repository errors into `ServiceError::Failed`
pub trait OrFail<T> {
    fn or_fail(self, message: &str) -> ServiceResult<T>;
}

impl<T> OrFail<T> for anyhow::Result<T> {
    fn or_fail(self, message: &str) -> ServiceResult<T> {
        self.map_err(|e| ServiceError::failed(message, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(ServiceError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(
            ServiceError::not_found("News not found").to_string(),
            "News not found"
        );
        assert!(ServiceError::RateLimited { retry_after: 30 }
            .to_string()
            .contains("30 seconds"));
    }

    #[test]
    fn test_or_fail_hides_source() {
        let result: anyhow::Result<()> = Err(anyhow::anyhow!("disk I/O error"));
        let err = result.or_fail("Failed to create event").unwrap_err();
        assert_eq!(err, ServiceError::Failed("Failed to create event".to_string()));
    }
}
