use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (a capability name such as `create_item`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const CREATE_ITEM: Permission = Permission::from_static("create_item");
pub const READ_ITEM: Permission = Permission::from_static("read_item");
pub const UPDATE_ITEM: Permission = Permission::from_static("update_item");
pub const DELETE_ITEM: Permission = Permission::from_static("delete_item");
pub const MANAGE_ROLES: Permission = Permission::from_static("manage_roles");

/// Seeded permissions with their descriptions.
pub const CATALOG: &[(&str, &str)] = &[
    ("create_item", "Create new items"),
    ("read_item", "View items"),
    ("update_item", "Modify existing items"),
    ("delete_item", "Delete items"),
    ("manage_roles", "Manage roles and permissions"),
];

/// Permissions granted to the default `user` role.
pub const BASELINE_USER: &[&str] = &["read_item", "create_item", "update_item", "delete_item"];
