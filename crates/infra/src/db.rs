//! Connection pool, schema and seed data.

use std::str::FromStr;

use sqlx::Transaction;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::instrument;

use itemgate_auth::{permissions, roles};
use itemgate_core::{DomainError, DomainResult};

use crate::error::map_sqlx_error;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id       INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        email               TEXT NOT NULL UNIQUE,
        password            TEXT NOT NULL,
        role_id             INTEGER NULL REFERENCES roles(id),
        reset_token         TEXT NULL,
        reset_token_expires TEXT NULL,
        created_at          TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at          TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL CHECK (length(name) > 0),
        description TEXT NOT NULL DEFAULT '',
        user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_items_user_id ON items(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_users_role_id ON users(role_id)",
    "CREATE INDEX IF NOT EXISTS idx_users_reset_token ON users(reset_token)",
];

/// Shared storage handle. Cloning is cheap (the pool is reference-counted).
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to `url` (e.g. `sqlite://itemgate.db?mode=rwc`) and migrate.
    pub async fn connect(url: &str) -> DomainResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DomainError::internal(format!("invalid database url: {e}")))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database, migrated and seeded.
    ///
    /// Every in-memory connection is its own database, so the pool is pinned
    /// to a single connection that is never recycled.
    pub async fn in_memory() -> DomainResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DomainError::internal(format!("invalid database url: {e}")))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and seed permissions and the `admin`/`user` roles.
    ///
    /// Idempotent: safe to run on every start.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn migrate(&self) -> DomainResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_schema", e))?;
        }

        for &(name, description) in permissions::CATALOG {
            sqlx::query("INSERT OR IGNORE INTO permissions (name, description) VALUES (?, ?)")
                .bind(name)
                .bind(description)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("seed_permissions", e))?;
        }

        // The admin role takes the sentinel id explicitly.
        sqlx::query("INSERT OR IGNORE INTO roles (id, name, description) VALUES (?, ?, ?)")
            .bind(roles::ADMIN_ROLE_ID.get())
            .bind(roles::ADMIN.as_str())
            .bind(roles::ADMIN_DESCRIPTION)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_admin_role", e))?;

        sqlx::query(
            "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) SELECT ?, id FROM permissions",
        )
        .bind(roles::ADMIN_ROLE_ID.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_admin_permissions", e))?;

        crate::roles::ensure_user_role(&mut *tx).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!("database schema ready");
        Ok(())
    }
}

/// Open a transaction holding the write lock from its first statement.
///
/// A deferred SQLite transaction that reads and then writes cannot wait
/// out a concurrent writer: the lock upgrade fails with `SQLITE_BUSY`.
/// `BEGIN IMMEDIATE` takes the lock up front, under the busy timeout.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DomainResult<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(|e| map_sqlx_error("begin_transaction", e))
}
