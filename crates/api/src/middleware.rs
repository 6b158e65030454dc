//! Request pipeline: request id/logging, authentication, per-route
//! permission gate.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::Instrument;

use itemgate_auth::{JwtValidator, Permission, PermissionChecker, TokenError, authorize};
use itemgate_core::DomainError;

use crate::app::errors::ApiError;
use crate::context::{AuthenticatedUser, RequestId};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Paths that skip authentication, matched as plain string prefixes.
///
/// Prefix matching is loose on purpose: `/api/login` also admits
/// `/api/loginXYZ`.
pub const PUBLIC_PREFIXES: &[&str] = &[
    "/health",
    "/api/login",
    "/api/signup",
    "/api/request-reset",
    "/api/reset-password",
];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Stage 1: authenticate the bearer token and attach [`AuthenticatedUser`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if is_public_path(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let token = extract_bearer(req.headers())?;
    let user_id = state.jwt.validate(token, Utc::now())?;

    tracing::Span::current().record("user_id", tracing::field::display(user_id));
    req.extensions_mut().insert(AuthenticatedUser::new(user_id));

    Ok(next.run(req).await)
}

pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, TokenError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(TokenError::MissingHeader)?;

    let header = header.to_str().map_err(|_| TokenError::MalformedHeader)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(TokenError::MalformedHeader)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(TokenError::MalformedHeader);
    }

    Ok(token)
}

/// Stage 2 state: the permission one route requires.
#[derive(Clone)]
pub struct PermissionGate {
    checker: Arc<dyn PermissionChecker>,
    permission: Permission,
}

impl PermissionGate {
    pub fn new(checker: Arc<dyn PermissionChecker>, permission: Permission) -> Self {
        Self {
            checker,
            permission,
        }
    }
}

/// Stage 2: allow the request only if the caller holds the gate's permission.
///
/// Runs after [`auth_middleware`]; a missing identity means the gate was
/// mounted on a public path and is treated as unauthenticated.
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .copied()
        .ok_or_else(|| DomainError::unauthenticated("user not authenticated"))?;

    authorize(gate.checker.as_ref(), user.user_id(), &gate.permission).await?;

    Ok(next.run(req).await)
}

/// Outermost layer: assign a request id, open the request span and log
/// completion.
pub async fn request_context(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(RequestId::new)
        .unwrap_or_else(RequestId::generate);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id.as_str(),
        method = %req.method(),
        path = %req.uri().path(),
        user_id = tracing::field::Empty,
    );

    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let status = response.status();
    span.in_scope(|| {
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), latency_ms, "request failed");
        } else {
            tracing::info!(status = status.as_u16(), latency_ms, "request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::http::header::AUTHORIZATION;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn missing_and_malformed_headers_are_distinguished() {
        assert_eq!(extract_bearer(&HeaderMap::new()), Err(TokenError::MissingHeader));
        assert_eq!(extract_bearer(&headers("Basic Zm9v")), Err(TokenError::MalformedHeader));
        assert_eq!(extract_bearer(&headers("Bearer    ")), Err(TokenError::MalformedHeader));
        assert_eq!(extract_bearer(&headers("bearer abc")), Err(TokenError::MalformedHeader));
    }

    #[test]
    fn public_prefixes_match_loosely() {
        assert!(is_public_path("/api/login"));
        assert!(is_public_path("/api/loginXYZ"));
        assert!(is_public_path("/health"));
        assert!(!is_public_path("/api/items"));
        assert!(!is_public_path("/api/me"));
        assert!(!is_public_path("/login/api"));
    }
}
