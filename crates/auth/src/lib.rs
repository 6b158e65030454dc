//! `itemgate-auth`: authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it issues and
//! verifies tokens, hashes passwords, and decides grant/deny given a
//! [`PermissionChecker`] supplied by the storage layer.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod token;

pub use authorize::{AuthzError, PermissionChecker, authorize};
pub use claims::{Claims, TOKEN_TTL, TokenValidationError, validate_claims};
pub use password::{generate_reset_token, hash_password, verify_password};
pub use permissions::Permission;
pub use roles::Role;
pub use token::{Hs256JwtService, JwtValidator, TokenError};
