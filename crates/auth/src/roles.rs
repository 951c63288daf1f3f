use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::permissions::Permission;

/// Marketplace role supplied by the identity provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }

    /// Permissions granted by this role.
    ///
    /// Admin receives the wildcard; the other roles get exactly what their
    /// screens need.
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            Role::Customer => vec![Permission::ORDERS_PLACE, Permission::ORDERS_READ_OWN],
            Role::Vendor => vec![
                Permission::BOOST_REQUEST,
                Permission::INVENTORY_EDIT,
                Permission::ORDERS_FULFILL,
            ],
            Role::Admin => vec![Permission::WILDCARD],
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}
