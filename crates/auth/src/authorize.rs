use async_trait::async_trait;
use thiserror::Error;

use itemgate_core::{DomainError, UserId};

use crate::Permission;

/// Source of truth for "does this user hold this permission".
///
/// Implemented by the storage-backed role registry. Every authorization
/// decision goes through this one predicate.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// `Ok(false)` both when the user has no role and when the role lacks the
    /// permission. `Err` only for lookup failures.
    async fn has_permission(
        &self,
        user_id: UserId,
        permission: &Permission,
    ) -> Result<bool, DomainError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("permission lookup failed: {0}")]
    Lookup(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(_) => DomainError::forbidden("permission denied"),
            AuthzError::Lookup(detail) => DomainError::internal(detail),
        }
    }
}

/// Authorize `user_id` for `required`.
pub async fn authorize(
    checker: &dyn PermissionChecker,
    user_id: UserId,
    required: &Permission,
) -> Result<(), AuthzError> {
    match checker.has_permission(user_id, required).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::debug!(user_id = %user_id, permission = %required, "permission denied");
            Err(AuthzError::Forbidden(required.as_str().to_string()))
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, permission = %required, error = %e, "permission lookup failed");
            Err(AuthzError::Lookup(e.to_string()))
        }
    }
}
