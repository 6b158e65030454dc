//! SQLx error mapping.
//!
//! | SQLx error | DomainError |
//! |------------|-------------|
//! | Database (unique violation) | `Conflict` |
//! | Database (foreign key violation) | `Validation` |
//! | Database (check violation) | `Validation` |
//! | anything else | `Internal` (detail kept for logs) |

use itemgate_core::DomainError;

/// Map a sqlx error for `operation` into the domain taxonomy, logging it.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DomainError::conflict("resource already exists")
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            DomainError::validation("referenced resource does not exist")
        }
        sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
            DomainError::validation("constraint violated")
        }
        _ => {
            tracing::error!(operation, error = %err, "storage operation failed");
            DomainError::internal(format!("database error in {operation}: {err}"))
        }
    }
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_internal() {
        let err = map_sqlx_error("load_role", sqlx::Error::PoolClosed);
        assert!(matches!(err, DomainError::Internal(ref m) if m.contains("load_role")));
        assert_eq!(err.public_message(), "internal server error");
    }

    #[tokio::test]
    async fn unique_violation_is_conflict() {
        let db = crate::Database::in_memory().await.unwrap();
        let err = sqlx::query("INSERT INTO permissions (name, description) VALUES ('read_item', 'dup')")
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(matches!(map_sqlx_error("insert", err), DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn check_violation_is_validation() {
        let db = crate::Database::in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (email, password) VALUES ('a@b.com', 'x')")
            .execute(db.pool())
            .await
            .unwrap();
        let err = sqlx::query("INSERT INTO items (name, description, user_id) VALUES ('', '', 1)")
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(matches!(map_sqlx_error("insert", err), DomainError::Validation(_)));
    }
}
