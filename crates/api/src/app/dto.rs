//! Request/response DTOs and JSON mapping helpers.

use serde::{Deserialize, Serialize};

use itemgate_core::{RoleId, UserId};
use itemgate_infra::UserRecord;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub id: UserId,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
}

impl From<UserRecord> for UserSummary {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `?page=&search=` for the item listing. Unparsable pages fall back to 1.
#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub page: Option<String>,
    pub search: Option<String>,
}

impl ItemListQuery {
    pub fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1)
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: Option<RoleId>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: UserId,
    pub email: String,
    pub role_id: Option<RoleId>,
    pub role: Option<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub permission: String,
    pub granted: bool,
}
