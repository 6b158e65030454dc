//! Item storage. Every query is scoped to the owning user; another user's
//! item is indistinguishable from a missing one.

use sqlx::sqlite::SqlitePool;
use tracing::instrument;

use itemgate_core::validate::validate_item_name;
use itemgate_core::{DomainError, DomainResult, ItemId, UserId};

use crate::Database;
use crate::error::map_sqlx_error;
use crate::models::{ItemInput, ItemPage, ItemRecord, ItemRow};

/// Fixed number of items per listing page.
pub const PAGE_SIZE: i64 = 3;

const SEARCH_FILTER: &str = "user_id = ?1 AND (?2 IS NULL OR name LIKE '%' || ?2 || '%' OR description LIKE '%' || ?2 || '%')";

#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// One page of the owner's items, newest first.
    ///
    /// Pages below 1 are treated as page 1. An empty `search` matches all.
    #[instrument(skip(self), fields(user_id = %owner), err(level = "debug"))]
    pub async fn list(
        &self,
        owner: UserId,
        page: i64,
        search: Option<&str>,
    ) -> DomainResult<ItemPage> {
        let page = page.max(1);
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let total_items: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM items WHERE {SEARCH_FILTER}"))
                .bind(owner.get())
                .bind(search)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("count_items", e))?;

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT id, name, description, created_at, updated_at FROM items \
             WHERE {SEARCH_FILTER} ORDER BY id DESC LIMIT ?3 OFFSET ?4"
        ))
        .bind(owner.get())
        .bind(search)
        .bind(PAGE_SIZE)
        .bind((page - 1).saturating_mul(PAGE_SIZE))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        Ok(ItemPage {
            items: rows.into_iter().map(ItemRecord::from).collect(),
            total_items,
            total_pages: total_pages(total_items),
            current_page: page,
        })
    }

    #[instrument(skip(self), fields(user_id = %owner, item_id = %id), err(level = "debug"))]
    pub async fn get(&self, owner: UserId, id: ItemId) -> DomainResult<ItemRecord> {
        sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, description, created_at, updated_at FROM items WHERE id = ? AND user_id = ?",
        )
        .bind(id.get())
        .bind(owner.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?
        .map(ItemRecord::from)
        .ok_or_else(item_not_found)
    }

    #[instrument(skip(self, input), fields(user_id = %owner), err(level = "debug"))]
    pub async fn create(&self, owner: UserId, input: &ItemInput) -> DomainResult<ItemRecord> {
        validate_item_name(&input.name)?;

        let id = sqlx::query("INSERT INTO items (name, description, user_id) VALUES (?, ?, ?)")
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(owner.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?
            .last_insert_rowid();

        let id = ItemId::new(id);
        tracing::debug!(item_id = %id, "item created");
        self.get(owner, id).await
    }

    #[instrument(skip(self, input), fields(user_id = %owner, item_id = %id), err(level = "debug"))]
    pub async fn update(
        &self,
        owner: UserId,
        id: ItemId,
        input: &ItemInput,
    ) -> DomainResult<ItemRecord> {
        validate_item_name(&input.name)?;

        let updated = sqlx::query(
            "UPDATE items SET name = ?, description = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND user_id = ?",
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(id.get())
        .bind(owner.get())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?
        .rows_affected();

        if updated == 0 {
            return Err(item_not_found());
        }
        self.get(owner, id).await
    }

    #[instrument(skip(self), fields(user_id = %owner, item_id = %id), err(level = "debug"))]
    pub async fn delete(&self, owner: UserId, id: ItemId) -> DomainResult<()> {
        let deleted = sqlx::query("DELETE FROM items WHERE id = ? AND user_id = ?")
            .bind(id.get())
            .bind(owner.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?
            .rows_affected();

        if deleted == 0 {
            return Err(item_not_found());
        }
        Ok(())
    }
}

fn total_pages(total_items: i64) -> i64 {
    (total_items + PAGE_SIZE - 1) / PAGE_SIZE
}

fn item_not_found() -> DomainError {
    DomainError::not_found("item not found")
}
