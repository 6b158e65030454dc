//! Signup, login and password reset. All public.

use axum::{extract::rejection::JsonRejection, http::StatusCode, Extension, Json};

use crate::app::dto::{
    CredentialsRequest, LoginResponse, MessageResponse, ResetPasswordRequest, ResetRequest,
    ResetTokenResponse, SignupResponse,
};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// POST /api/signup
pub async fn signup(
    Extension(services): Extension<AppServices>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let Json(body) = body?;
    let user = services.users.signup(body.email.trim(), &body.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "user created",
            id: user.id,
        }),
    ))
}

/// POST /api/login
pub async fn login(
    Extension(services): Extension<AppServices>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(body) = body?;
    let user = services
        .users
        .authenticate(body.email.trim(), &body.password)
        .await?;
    let token = services.jwt.issue(user.id)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

/// POST /api/request-reset
///
/// Delivery is stubbed: the token is returned to the caller.
pub async fn request_reset(
    Extension(services): Extension<AppServices>,
    body: Result<Json<ResetRequest>, JsonRejection>,
) -> Result<Json<ResetTokenResponse>, ApiError> {
    let Json(body) = body?;
    let token = services.users.request_password_reset(body.email.trim()).await?;
    Ok(Json(ResetTokenResponse { token }))
}

/// POST /api/reset-password
pub async fn reset_password(
    Extension(services): Extension<AppServices>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(body) = body?;
    services
        .users
        .reset_password(body.token.trim(), &body.password)
        .await?;
    Ok(Json(MessageResponse {
        message: "password updated",
    }))
}
