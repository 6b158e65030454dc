//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage and token service handles shared by handlers
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use itemgate_infra::Database;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Layer order, outermost first: request context, authentication,
/// shared services, per-route permission gates.
pub fn build_app(jwt_secret: &str, db: &Database) -> Router {
    let services = services::AppServices::new(jwt_secret, db);
    let auth_state = middleware::AuthState {
        jwt: Arc::clone(&services.jwt) as Arc<dyn itemgate_auth::JwtValidator>,
    };

    routes::router(&services)
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_context))
                .layer(axum::middleware::from_fn_with_state(
                    auth_state,
                    middleware::auth_middleware,
                )),
        )
}
