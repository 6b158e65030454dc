//! Role/Permission Registry.
//!
//! Multi-statement changes (create/update/delete) run inside one
//! `sqlx::Transaction`; an error or early return drops the transaction
//! uncommitted, which rolls it back.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use tracing::instrument;

use itemgate_auth::{Permission, PermissionChecker, permissions, roles};
use itemgate_core::{DomainError, DomainResult, PermissionId, RoleId, UserId};

use crate::Database;
use crate::db::begin_write;
use crate::error::{is_foreign_key_violation, map_sqlx_error};
use crate::models::{PermissionRecord, PermissionRow, RoleInput, RoleRecord, RoleRow};

#[derive(Debug, Clone)]
pub struct RoleRegistry {
    pool: SqlitePool,
}

impl RoleRegistry {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// All roles ordered by name, each with its name-sorted permissions.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn list_roles(&self) -> DomainResult<Vec<RoleRecord>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let perms = self.permissions_of(RoleId::new(row.id)).await?;
            roles.push(row.with_permissions(perms));
        }
        Ok(roles)
    }

    #[instrument(skip(self), fields(role_id = %id), err(level = "debug"))]
    pub async fn get_role(&self, id: RoleId) -> DomainResult<RoleRecord> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = ?",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_role", e))?
        .ok_or_else(|| DomainError::not_found("role not found"))?;

        let perms = self.permissions_of(id).await?;
        Ok(row.with_permissions(perms))
    }

    #[instrument(skip(self, input), fields(name = %input.name), err(level = "debug"))]
    pub async fn create_role(&self, input: &RoleInput) -> DomainResult<RoleRecord> {
        let name = validated_name(input)?;

        let mut tx = begin_write(&self.pool).await?;

        let role_id = sqlx::query("INSERT INTO roles (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(&input.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| match map_sqlx_error("insert_role", e) {
                DomainError::Conflict(_) => DomainError::conflict("role name already exists"),
                other => other,
            })?
            .last_insert_rowid();
        let role_id = RoleId::new(role_id);

        insert_grants(&mut tx, role_id, &input.permissions).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(role_id = %role_id, "role created");
        self.get_role(role_id).await
    }

    /// Replace name, description and the full permission set of a role.
    #[instrument(skip(self, input), fields(role_id = %id), err(level = "debug"))]
    pub async fn update_role(&self, id: RoleId, input: &RoleInput) -> DomainResult<RoleRecord> {
        if roles::is_admin_sentinel(id) {
            return Err(DomainError::forbidden("cannot modify admin role"));
        }
        let name = validated_name(input)?;

        let mut tx = begin_write(&self.pool).await?;

        let updated = sqlx::query(
            "UPDATE roles SET name = ?, description = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(name)
        .bind(&input.description)
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_error("update_role", e) {
            DomainError::Conflict(_) => DomainError::conflict("role name already exists"),
            other => other,
        })?
        .rows_affected();
        if updated == 0 {
            return Err(DomainError::not_found("role not found"));
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_role_permissions", e))?;

        insert_grants(&mut tx, id, &input.permissions).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(role_id = %id, "role updated");
        self.get_role(id).await
    }

    #[instrument(skip(self), fields(role_id = %id), err(level = "debug"))]
    pub async fn delete_role(&self, id: RoleId) -> DomainResult<()> {
        if roles::is_admin_sentinel(id) {
            return Err(DomainError::forbidden("cannot delete admin role"));
        }

        let mut tx = begin_write(&self.pool).await?;

        let in_use: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
            .bind(id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_role_users", e))?;
        if in_use > 0 {
            return Err(role_in_use());
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_role_permissions", e))?;

        let deleted = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    role_in_use()
                } else {
                    map_sqlx_error("delete_role", e)
                }
            })?
            .rows_affected();
        if deleted == 0 {
            return Err(DomainError::not_found("role not found"));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(role_id = %id, "role deleted");
        Ok(())
    }

    #[instrument(skip(self), err(level = "debug"))]
    pub async fn list_permissions(&self) -> DomainResult<Vec<PermissionRecord>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, description, created_at FROM permissions ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_permissions", e))?;

        Ok(rows.into_iter().map(PermissionRecord::from).collect())
    }

    /// Single existential query: user -> role -> role_permissions -> permission.
    ///
    /// A user without a role, an unknown user, and a role lacking the
    /// permission all yield `false`.
    #[instrument(skip(self), fields(user_id = %user_id), err(level = "debug"))]
    pub async fn has_permission(&self, user_id: UserId, permission: &str) -> DomainResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM users u
                JOIN roles r ON r.id = u.role_id
                JOIN role_permissions rp ON rp.role_id = r.id
                JOIN permissions p ON p.id = rp.permission_id
                WHERE u.id = ? AND p.name = ?
            )
            "#,
        )
        .bind(user_id.get())
        .bind(permission)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("has_permission", e))
    }

    /// Name-sorted permission names the user currently holds.
    #[instrument(skip(self), fields(user_id = %user_id), err(level = "debug"))]
    pub async fn user_permissions(&self, user_id: UserId) -> DomainResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.name
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN users u ON u.role_id = rp.role_id
            WHERE u.id = ?
            ORDER BY p.name
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("user_permissions", e))
    }

    async fn permissions_of(&self, role_id: RoleId) -> DomainResult<Vec<PermissionRecord>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT p.id, p.name, p.description, p.created_at
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(role_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role_permissions", e))?;

        Ok(rows.into_iter().map(PermissionRecord::from).collect())
    }
}

#[async_trait]
impl PermissionChecker for RoleRegistry {
    async fn has_permission(
        &self,
        user_id: UserId,
        permission: &Permission,
    ) -> Result<bool, DomainError> {
        RoleRegistry::has_permission(self, user_id, permission.as_str()).await
    }
}

fn validated_name(input: &RoleInput) -> DomainResult<&str> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("role name is required"));
    }
    Ok(name)
}

fn role_in_use() -> DomainError {
    DomainError::conflict("cannot delete role while it is assigned to users")
}

/// Insert one join row per permission id. Duplicate ids collapse.
async fn insert_grants(
    conn: &mut SqliteConnection,
    role_id: RoleId,
    permission_ids: &[PermissionId],
) -> DomainResult<()> {
    for permission_id in permission_ids {
        sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role_id.get())
            .bind(permission_id.get())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    DomainError::validation(format!("unknown permission id {permission_id}"))
                } else {
                    map_sqlx_error("insert_role_permission", e)
                }
            })?;
    }
    Ok(())
}

/// Find-or-create the default `user` role, seeding its baseline permissions
/// only when this call created it.
///
/// Concurrent callers race on the unique role name: the loser's insert is
/// ignored and it reads the winner's row.
pub(crate) async fn ensure_user_role(conn: &mut SqliteConnection) -> DomainResult<RoleId> {
    let created = sqlx::query("INSERT OR IGNORE INTO roles (name, description) VALUES (?, ?)")
        .bind(roles::USER.as_str())
        .bind(roles::USER_DESCRIPTION)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_user_role", e))?
        .rows_affected()
        > 0;

    let role_id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(roles::USER.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_user_role", e))?;

    if created {
        for name in permissions::BASELINE_USER {
            sqlx::query(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) SELECT ?, id FROM permissions WHERE name = ?",
            )
            .bind(role_id)
            .bind(*name)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("seed_user_role_permissions", e))?;
        }
        tracing::info!(role_id, "default user role created");
    }

    Ok(RoleId::new(role_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserStore;

    async fn setup() -> (Database, RoleRegistry, UserStore) {
        let db = Database::in_memory().await.unwrap();
        let registry = RoleRegistry::new(&db);
        let users = UserStore::new(&db);
        (db, registry, users)
    }

    async fn permission_id(registry: &RoleRegistry, name: &str) -> PermissionId {
        registry
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap()
            .id
    }

    async fn grant_rows(db: &Database, role_id: RoleId) -> Vec<i64> {
        sqlx::query_scalar(
            "SELECT permission_id FROM role_permissions WHERE role_id = ? ORDER BY permission_id",
        )
        .bind(role_id.get())
        .fetch_all(db.pool())
        .await
        .unwrap()
    }

    fn input(name: &str, permissions: Vec<PermissionId>) -> RoleInput {
        RoleInput {
            name: name.to_string(),
            description: format!("{name} role"),
            permissions,
        }
    }

    #[tokio::test]
    async fn seeded_roles_are_listed_with_sorted_permissions() {
        let (_db, registry, _) = setup().await;
        let roles = registry.list_roles().await.unwrap();

        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "user"]);

        let user_perms: Vec<_> = roles[1].permissions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            user_perms,
            vec!["create_item", "delete_item", "read_item", "update_item"]
        );
        assert_eq!(roles[0].permissions.len(), permissions::CATALOG.len());
    }

    #[tokio::test]
    async fn permissions_are_name_sorted() {
        let (_db, registry, _) = setup().await;
        let names: Vec<_> = registry
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn get_missing_role_is_not_found() {
        let (_db, registry, _) = setup().await;
        let err = registry.get_role(RoleId::new(999)).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_role_with_permissions() {
        let (_db, registry, _) = setup().await;
        let read = permission_id(&registry, "read_item").await;

        let role = registry.create_role(&input("viewer", vec![read])).await.unwrap();
        assert_eq!(role.name, "viewer");
        assert_eq!(role.permissions.len(), 1);
        assert_eq!(role.permissions[0].name, "read_item");
    }

    #[tokio::test]
    async fn create_role_requires_a_name() {
        let (_db, registry, _) = setup().await;
        let err = registry.create_role(&input("  ", vec![])).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_role_name_conflicts() {
        let (_db, registry, _) = setup().await;
        let err = registry.create_role(&input("admin", vec![])).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_grant_rolls_back_the_whole_role() {
        let (_db, registry, _) = setup().await;
        let read = permission_id(&registry, "read_item").await;

        let err = registry
            .create_role(&input("broken", vec![read, PermissionId::new(4040)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let names: Vec<_> = registry
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert!(!names.contains(&"broken".to_string()));
    }

    #[tokio::test]
    async fn update_role_replaces_permission_set_idempotently() {
        let (db, registry, _) = setup().await;
        let read = permission_id(&registry, "read_item").await;
        let create = permission_id(&registry, "create_item").await;
        let delete = permission_id(&registry, "delete_item").await;

        let role = registry
            .create_role(&input("editor", vec![read, delete]))
            .await
            .unwrap();

        let update = input("editor", vec![read, create]);
        registry.update_role(role.id, &update).await.unwrap();
        let first = grant_rows(&db, role.id).await;
        registry.update_role(role.id, &update).await.unwrap();
        let second = grant_rows(&db, role.id).await;

        assert_eq!(first, second);
        let mut expected = vec![read.get(), create.get()];
        expected.sort();
        assert_eq!(second, expected);
    }

    #[tokio::test]
    async fn update_collapses_duplicate_permission_ids() {
        let (db, registry, _) = setup().await;
        let read = permission_id(&registry, "read_item").await;
        let role = registry.create_role(&input("dups", vec![])).await.unwrap();

        registry
            .update_role(role.id, &input("dups", vec![read, read]))
            .await
            .unwrap();
        assert_eq!(grant_rows(&db, role.id).await, vec![read.get()]);
    }

    #[tokio::test]
    async fn admin_sentinel_is_immutable() {
        let (_db, registry, _) = setup().await;
        let err = registry
            .update_role(roles::ADMIN_ROLE_ID, &input("root", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        let err = registry.delete_role(roles::ADMIN_ROLE_ID).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        let admin = registry.get_role(roles::ADMIN_ROLE_ID).await.unwrap();
        assert_eq!(admin.name, "admin");
    }

    #[tokio::test]
    async fn update_missing_role_is_not_found() {
        let (_db, registry, _) = setup().await;
        let err = registry
            .update_role(RoleId::new(777), &input("ghost", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn role_in_use_cannot_be_deleted_until_reassigned() {
        let (db, registry, users) = setup().await;
        let role = registry.create_role(&input("temp", vec![])).await.unwrap();
        let user = users.signup("a@b.com", "longenough").await.unwrap();
        users.assign_role(user.id, Some(role.id)).await.unwrap();

        let err = registry.delete_role(role.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        users.assign_role(user.id, None).await.unwrap();
        registry.delete_role(role.id).await.unwrap();

        assert!(matches!(
            registry.get_role(role.id).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(grant_rows(&db, role.id).await.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_role_is_not_found() {
        let (_db, registry, _) = setup().await;
        let err = registry.delete_role(RoleId::new(555)).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn user_without_role_has_no_permissions() {
        let (_db, registry, users) = setup().await;
        let user = users.signup("norole@b.com", "longenough").await.unwrap();
        users.assign_role(user.id, None).await.unwrap();

        for &(name, _) in permissions::CATALOG {
            assert!(!registry.has_permission(user.id, name).await.unwrap());
        }
        assert!(registry.user_permissions(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn role_membership_drives_has_permission() {
        let (_db, registry, users) = setup().await;
        let user = users.signup("member@b.com", "longenough").await.unwrap();

        assert!(registry.has_permission(user.id, "read_item").await.unwrap());
        assert!(!registry.has_permission(user.id, "manage_roles").await.unwrap());
        assert!(!registry.has_permission(UserId::new(9999), "read_item").await.unwrap());

        users.assign_role(user.id, Some(roles::ADMIN_ROLE_ID)).await.unwrap();
        assert!(registry.has_permission(user.id, "manage_roles").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_user_role_is_idempotent() {
        let (db, _registry, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let first = ensure_user_role(&mut conn).await.unwrap();
        let second = ensure_user_role(&mut conn).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_user_role_is_recreated_with_baseline() {
        let (db, registry, _) = setup().await;
        sqlx::query("DELETE FROM roles WHERE name = 'user'")
            .execute(db.pool())
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let id = ensure_user_role(&mut conn).await.unwrap();
        drop(conn);

        let role = registry.get_role(id).await.unwrap();
        assert_eq!(role.name, "user");
        assert_eq!(role.permissions.len(), permissions::BASELINE_USER.len());
    }
}
