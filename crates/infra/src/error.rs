use thiserror::Error;

use kudimall_auth::AuthzError;
use kudimall_core::DomainError;

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error surface of the marketplace services.
///
/// Validation and conflict failures are always raised before any mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A compare-and-swap kept losing, or a versioned write was stale.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// A collaborator (store, notifier) failed.
    #[error("dependency failure: {0}")]
    Dependency(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Concurrency(_) => "concurrency_conflict",
            ServiceError::Dependency(_) => "dependency_failure",
            ServiceError::Forbidden(_) => "forbidden",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::InvariantViolation(msg) | DomainError::Conflict(msg) => {
                ServiceError::Conflict(msg)
            }
            DomainError::NotFound(msg) => ServiceError::NotFound(msg),
            DomainError::Concurrency(msg) => ServiceError::Concurrency(msg),
            DomainError::Forbidden(msg) => ServiceError::Forbidden(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Concurrency(msg) => ServiceError::Concurrency(msg),
            StoreError::Domain(err) => err.into(),
            StoreError::Backend(msg) => ServiceError::Dependency(msg),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Forbidden(value.to_string())
    }
}
