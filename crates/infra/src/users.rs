//! Credential Store: signup, login, password reset and role assignment.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::instrument;

use itemgate_auth::{generate_reset_token, hash_password, roles, verify_password};
use itemgate_core::validate::{validate_email, validate_password};
use itemgate_core::{DomainError, DomainResult, RoleId, UserId};

use crate::Database;
use crate::db::begin_write;
use crate::error::{is_foreign_key_violation, map_sqlx_error};
use crate::models::{UserRecord, UserRow};

/// Reset tokens stay valid for this long after being requested.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

const INVALID_CREDENTIALS: &str = "invalid credentials";
const INVALID_RESET_TOKEN: &str = "invalid or expired reset token";

const SELECT_USER: &str = "SELECT id, email, role_id, created_at, updated_at FROM users";

#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Register a new account holding the default `user` role.
    ///
    /// The role is created on first use with its baseline permissions.
    #[instrument(skip(self, password), err(level = "debug"))]
    pub async fn signup(&self, email: &str, password: &str) -> DomainResult<UserRecord> {
        validate_email(email)?;
        validate_password(password)?;
        let hash = hash_blocking(password).await?;

        let mut tx = begin_write(&self.pool).await?;

        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = ?)")
            .bind(email)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("check_email", e))?;
        if taken {
            return Err(email_taken());
        }

        let role_id = crate::roles::ensure_user_role(&mut *tx).await?;

        let user_id = sqlx::query("INSERT INTO users (email, password, role_id) VALUES (?, ?, ?)")
            .bind(email)
            .bind(&hash)
            .bind(role_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| match map_sqlx_error("insert_user", e) {
                DomainError::Conflict(_) => email_taken(),
                other => other,
            })?
            .last_insert_rowid();

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let user_id = UserId::new(user_id);
        tracing::info!(user_id = %user_id, "user registered");
        self.find_by_id(user_id).await
    }

    /// Check an email/password pair.
    ///
    /// Unknown email and wrong password fail identically.
    #[instrument(skip(self, password), err(level = "debug"))]
    pub async fn authenticate(&self, email: &str, password: &str) -> DomainResult<UserRecord> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("load_credentials", e))?;

        let Some((id, stored_hash)) = row else {
            return Err(DomainError::unauthenticated(INVALID_CREDENTIALS));
        };

        let password = password.to_owned();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| DomainError::internal(format!("password check aborted: {e}")))?;
        if !matches {
            return Err(DomainError::unauthenticated(INVALID_CREDENTIALS));
        }

        self.find_by_id(UserId::new(id)).await
    }

    #[instrument(skip(self), fields(user_id = %id), err(level = "debug"))]
    pub async fn find_by_id(&self, id: UserId) -> DomainResult<UserRecord> {
        sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?
            .map(UserRecord::from)
            .ok_or_else(|| DomainError::not_found("user not found"))
    }

    /// Store a fresh reset token valid for [`RESET_TOKEN_TTL`] and return it.
    ///
    /// A previous outstanding token is replaced.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn request_password_reset(&self, email: &str) -> DomainResult<String> {
        let token = generate_reset_token();
        let expires = Utc::now() + RESET_TOKEN_TTL;

        let updated = sqlx::query(
            "UPDATE users SET reset_token = ?, reset_token_expires = ?, updated_at = CURRENT_TIMESTAMP WHERE email = ?",
        )
        .bind(&token)
        .bind(expires)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("store_reset_token", e))?
        .rows_affected();

        if updated == 0 {
            return Err(DomainError::not_found("email not found"));
        }
        Ok(token)
    }

    /// Consume a reset token and set a new password.
    #[instrument(skip(self, token, new_password), err(level = "debug"))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> DomainResult<()> {
        self.reset_password_at(token, new_password, Utc::now()).await
    }

    pub(crate) async fn reset_password_at(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        validate_password(new_password)?;
        if token.is_empty() {
            return Err(DomainError::validation(INVALID_RESET_TOKEN));
        }
        let hash = hash_blocking(new_password).await?;

        let mut tx = begin_write(&self.pool).await?;

        let row: Option<(i64, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT id, reset_token_expires FROM users WHERE reset_token = ?")
                .bind(token)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("load_reset_token", e))?;

        let user_id = match row {
            Some((id, Some(expires))) if expires > now => id,
            _ => return Err(DomainError::validation(INVALID_RESET_TOKEN)),
        };

        sqlx::query(
            "UPDATE users SET password = ?, reset_token = NULL, reset_token_expires = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_password", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(user_id, "password reset completed");
        Ok(())
    }

    /// Set or clear the single role a user holds.
    #[instrument(skip(self), fields(user_id = %user_id), err(level = "debug"))]
    pub async fn assign_role(
        &self,
        user_id: UserId,
        role_id: Option<RoleId>,
    ) -> DomainResult<UserRecord> {
        let updated = sqlx::query(
            "UPDATE users SET role_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(role_id.map(|r| r.get()))
        .bind(user_id.get())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DomainError::validation("role does not exist")
            } else {
                map_sqlx_error("assign_role", e)
            }
        })?
        .rows_affected();

        if updated == 0 {
            return Err(DomainError::not_found("user not found"));
        }
        tracing::info!(user_id = %user_id, role_id = ?role_id.map(|r| r.get()), "role assigned");
        self.find_by_id(user_id).await
    }

    /// Make sure `email` exists and holds the admin role.
    ///
    /// An existing account keeps its password; a missing one is created
    /// with `password`.
    #[instrument(skip(self, password), err(level = "debug"))]
    pub async fn ensure_admin(&self, email: &str, password: &str) -> DomainResult<UserRecord> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_admin", e))?;

        let user_id = match existing {
            Some(id) => UserId::new(id),
            None => self.signup(email, password).await?.id,
        };
        self.assign_role(user_id, Some(roles::ADMIN_ROLE_ID)).await
    }
}

fn email_taken() -> DomainError {
    DomainError::conflict("email already registered")
}

/// Hash on the blocking pool, off the async workers.
async fn hash_blocking(password: &str) -> DomainResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| DomainError::internal(format!("password hashing aborted: {e}")))?
}
