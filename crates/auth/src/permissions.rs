use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "orders.place"). The wildcard `"*"`
/// grants everything and is reserved for admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const ORDERS_PLACE: Permission = Permission(Cow::Borrowed("orders.place"));
    pub const ORDERS_READ_OWN: Permission = Permission(Cow::Borrowed("orders.read_own"));
    pub const ORDERS_READ_ALL: Permission = Permission(Cow::Borrowed("orders.read_all"));
    pub const ORDERS_FULFILL: Permission = Permission(Cow::Borrowed("orders.fulfill"));
    pub const INVENTORY_EDIT: Permission = Permission(Cow::Borrowed("inventory.edit"));
    pub const BOOST_REQUEST: Permission = Permission(Cow::Borrowed("boost.request"));
    pub const BOOST_REVIEW: Permission = Permission(Cow::Borrowed("boost.review"));
    pub const SETTINGS_EDIT: Permission = Permission(Cow::Borrowed("settings.edit"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
