//! Owner-scoped item CRUD.

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    Extension, Json,
};

use itemgate_core::ItemId;
use itemgate_infra::{ItemInput, ItemPage, ItemRecord};

use crate::app::dto::ItemListQuery;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AuthenticatedUser;

/// GET /api/items?page=&search=
pub async fn list(
    Extension(services): Extension<AppServices>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<ItemPage>, ApiError> {
    let page = services
        .items
        .list(user.user_id(), query.page(), query.search.as_deref())
        .await?;
    Ok(Json(page))
}

/// GET /api/items/:id
pub async fn get_one(
    Extension(services): Extension<AppServices>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ItemRecord>, ApiError> {
    let id: ItemId = id.parse()?;
    Ok(Json(services.items.get(user.user_id(), id).await?))
}

/// POST /api/items
pub async fn create(
    Extension(services): Extension<AppServices>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Result<Json<ItemInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ItemRecord>), ApiError> {
    let Json(body) = body?;
    let item = services.items.create(user.user_id(), &body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /api/items/:id
pub async fn update(
    Extension(services): Extension<AppServices>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Result<Json<ItemInput>, JsonRejection>,
) -> Result<Json<ItemRecord>, ApiError> {
    let id: ItemId = id.parse()?;
    let Json(body) = body?;
    Ok(Json(services.items.update(user.user_id(), id, &body).await?))
}

/// DELETE /api/items/:id
pub async fn delete(
    Extension(services): Extension<AppServices>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ItemId = id.parse()?;
    services.items.delete(user.user_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
