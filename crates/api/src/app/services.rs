//! Service wiring shared by all handlers.

use std::sync::Arc;

use itemgate_auth::{Hs256JwtService, PermissionChecker};
use itemgate_infra::{Database, ItemStore, RoleRegistry, UserStore};

/// Everything a handler may need, cloned cheaply into each request.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub jwt: Arc<Hs256JwtService>,
    pub users: UserStore,
    pub roles: RoleRegistry,
    pub items: ItemStore,
}

impl AppServices {
    pub fn new(jwt_secret: &str, db: &Database) -> Self {
        Self {
            jwt: Arc::new(Hs256JwtService::new(jwt_secret)),
            users: UserStore::new(db),
            roles: RoleRegistry::new(db),
            items: ItemStore::new(db),
        }
    }

    /// The registry as the authorization predicate.
    pub fn permission_checker(&self) -> Arc<dyn PermissionChecker> {
        Arc::new(self.roles.clone())
    }
}
