//! Infrastructure layer: SQLite storage for credentials, roles/permissions
//! and items.

pub mod db;
pub mod error;
pub mod items;
pub mod models;
pub mod roles;
pub mod users;

pub use db::Database;
pub use error::map_sqlx_error;
pub use items::{ItemStore, PAGE_SIZE};
pub use models::{ItemInput, ItemPage, ItemRecord, PermissionRecord, RoleInput, RoleRecord, UserRecord};
pub use roles::RoleRegistry;
pub use users::UserStore;
