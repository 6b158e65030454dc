use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};

use itemgate_core::UserId;
use itemgate_infra::UserRecord;

use crate::app::dto::AssignRoleRequest;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// PUT /api/users/:id/role
///
/// `{"role_id": null}` clears the user's role.
pub async fn assign_role(
    Extension(services): Extension<AppServices>,
    Path(id): Path<String>,
    body: Result<Json<AssignRoleRequest>, JsonRejection>,
) -> Result<Json<UserRecord>, ApiError> {
    let id: UserId = id.parse()?;
    let Json(body) = body?;
    Ok(Json(services.users.assign_role(id, body.role_id).await?))
}
