//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure a caller can observe is one of these variants. Storage and
/// other infrastructure failures are collapsed into [`DomainError::Internal`]
/// at the boundary; the carried detail is for logs only and must never be
/// rendered to a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing/invalid/expired credentials or token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated, but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate or still-referenced state (e.g. email taken, role in use).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected failure in a lower layer.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Message that is safe to show to a client.
    pub fn public_message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Unauthenticated(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m) => m,
            Self::Internal(_) => "internal server error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_is_not_public() {
        let err = DomainError::internal("disk I/O error on users table");
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.to_string().contains("disk I/O"));
    }

    #[test]
    fn business_errors_keep_their_message() {
        assert_eq!(
            DomainError::conflict("email already registered").public_message(),
            "email already registered"
        );
    }
}
