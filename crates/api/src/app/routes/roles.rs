//! Role and permission administration. Every route here requires
//! `manage_roles`.

use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    Extension, Json,
};

use itemgate_auth::{authorize, Permission};
use itemgate_core::RoleId;
use itemgate_infra::{PermissionRecord, RoleInput, RoleRecord};

use crate::app::dto::PermissionCheckResponse;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AuthenticatedUser;

/// GET /api/roles
pub async fn list_roles(
    Extension(services): Extension<AppServices>,
) -> Result<Json<Vec<RoleRecord>>, ApiError> {
    Ok(Json(services.roles.list_roles().await?))
}

/// GET /api/roles/:id
pub async fn get_role(
    Extension(services): Extension<AppServices>,
    Path(id): Path<String>,
) -> Result<Json<RoleRecord>, ApiError> {
    let id: RoleId = id.parse()?;
    Ok(Json(services.roles.get_role(id).await?))
}

/// POST /api/roles
pub async fn create_role(
    Extension(services): Extension<AppServices>,
    body: Result<Json<RoleInput>, JsonRejection>,
) -> Result<(StatusCode, Json<RoleRecord>), ApiError> {
    let Json(body) = body?;
    let role = services.roles.create_role(&body).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /api/roles/:id
pub async fn update_role(
    Extension(services): Extension<AppServices>,
    Path(id): Path<String>,
    body: Result<Json<RoleInput>, JsonRejection>,
) -> Result<Json<RoleRecord>, ApiError> {
    let id: RoleId = id.parse()?;
    let Json(body) = body?;
    Ok(Json(services.roles.update_role(id, &body).await?))
}

/// DELETE /api/roles/:id
pub async fn delete_role(
    Extension(services): Extension<AppServices>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: RoleId = id.parse()?;
    services.roles.delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/permissions
pub async fn list_permissions(
    Extension(services): Extension<AppServices>,
) -> Result<Json<Vec<PermissionRecord>>, ApiError> {
    Ok(Json(services.roles.list_permissions().await?))
}

/// GET /api/permissions/check/:permission
///
/// 200 when the caller holds the named permission, 403 otherwise.
pub async fn check_permission(
    Extension(services): Extension<AppServices>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(permission): Path<String>,
) -> Result<Json<PermissionCheckResponse>, ApiError> {
    let permission = Permission::new(permission);
    authorize(&services.roles, user.user_id(), &permission).await?;

    Ok(Json(PermissionCheckResponse {
        permission: permission.as_str().to_string(),
        granted: true,
    }))
}
