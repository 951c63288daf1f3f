use serde::{Deserialize, Serialize};

use kudimall_core::{UserId, VendorId};

use crate::Role;

/// An identified caller as supplied by the identity/role provider.
///
/// `vendor_id` is the storefront owned by the user and is only meaningful for
/// vendors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub vendor_id: Option<VendorId>,
}

impl Principal {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
            vendor_id: None,
        }
    }

    pub fn vendor(user_id: UserId, vendor_id: VendorId) -> Self {
        Self {
            user_id,
            role: Role::Vendor,
            vendor_id: Some(vendor_id),
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            vendor_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
