use axum::{http::StatusCode, response::Response, Extension, Json};
use serde_json::{json, Value};

use crate::app::dto::MeResponse;
use crate::app::errors::{json_error, ApiError};
use crate::app::services::AppServices;
use crate::context::AuthenticatedUser;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /api/me: the caller and its effective permissions.
pub async fn me(
    Extension(services): Extension<AppServices>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<MeResponse>, ApiError> {
    let record = services.users.find_by_id(user.user_id()).await?;
    let role = match record.role_id {
        Some(role_id) => Some(services.roles.get_role(role_id).await?.name),
        None => None,
    };
    let permissions = services.roles.user_permissions(user.user_id()).await?;

    Ok(Json(MeResponse {
        id: record.id,
        email: record.email,
        role_id: record.role_id,
        role,
        permissions,
    }))
}
