//! `kudimall-auth` — pure authorization boundary.
//!
//! Identity and sessions are issued elsewhere; this crate only decides whether
//! an already-identified principal may perform an operation.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, ensure_vendor};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
