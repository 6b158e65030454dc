use axum::{
    handler::Handler,
    routing::{get, post, put},
    Router,
};

use itemgate_auth::permissions::{CREATE_ITEM, DELETE_ITEM, MANAGE_ROLES, READ_ITEM, UPDATE_ITEM};
use itemgate_auth::Permission;

use crate::app::services::AppServices;
use crate::middleware::{require_permission, PermissionGate};

pub mod auth;
pub mod items;
pub mod roles;
pub mod system;
pub mod users;

/// Full route tree. Authentication is applied by the caller; each route
/// here carries its own permission gate.
pub fn router(services: &AppServices) -> Router {
    let checker = services.permission_checker();
    let gate = |permission: Permission| {
        axum::middleware::from_fn_with_state(
            PermissionGate::new(checker.clone(), permission),
            require_permission,
        )
    };

    let items = Router::new()
        .route(
            "/",
            get(items::list.layer(gate(READ_ITEM))).post(items::create.layer(gate(CREATE_ITEM))),
        )
        .route(
            "/:id",
            get(items::get_one.layer(gate(READ_ITEM)))
                .put(items::update.layer(gate(UPDATE_ITEM)))
                .delete(items::delete.layer(gate(DELETE_ITEM))),
        );

    let admin = Router::new()
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/:id",
            get(roles::get_role).put(roles::update_role).delete(roles::delete_role),
        )
        .route("/permissions", get(roles::list_permissions))
        .route("/permissions/check/:permission", get(roles::check_permission))
        .route("/users/:id/role", put(users::assign_role))
        .route_layer(gate(MANAGE_ROLES));

    let api = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/request-reset", post(auth::request_reset))
        .route("/reset-password", post(auth::reset_password))
        .route("/me", get(system::me))
        .nest("/items", items)
        .merge(admin);

    Router::new()
        .route("/health", get(system::health))
        .nest("/api", api)
        .fallback(system::not_found)
}
