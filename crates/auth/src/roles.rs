use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use itemgate_core::RoleId;

/// Role name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ADMIN: Role = Role::from_static("admin");
pub const USER: Role = Role::from_static("user");

pub const ADMIN_DESCRIPTION: &str = "Administrator with all permissions";
pub const USER_DESCRIPTION: &str = "Standard user with basic permissions";

/// The admin role is always the first seeded row.
pub const ADMIN_ROLE_ID: RoleId = RoleId::new(1);

/// The admin sentinel can be neither modified nor deleted.
pub fn is_admin_sentinel(id: RoleId) -> bool {
    id == ADMIN_ROLE_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_role_is_sentinel() {
        assert!(is_admin_sentinel(RoleId::new(1)));
        assert!(!is_admin_sentinel(RoleId::new(2)));
    }
}
