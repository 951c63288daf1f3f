use thiserror::Error;

use kudimall_core::{DomainError, VendorId};

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: caller does not own vendor {0}")]
    NotOwner(VendorId),

    #[error("forbidden: role '{0}' is not a vendor")]
    NotAVendor(Role),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::forbidden(value.to_string())
    }
}

/// Authorize a principal for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal.role.permissions();
    if granted.iter().any(|p| p.is_wildcard() || p == required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Require the caller to be the vendor owning `owner`.
///
/// Admins are not exempt: requesting a boost is a vendor action.
pub fn ensure_vendor(principal: &Principal, owner: VendorId) -> Result<(), AuthzError> {
    if principal.role != Role::Vendor {
        return Err(AuthzError::NotAVendor(principal.role));
    }
    match principal.vendor_id {
        Some(vendor_id) if vendor_id == owner => Ok(()),
        _ => Err(AuthzError::NotOwner(owner)),
    }
}
