//! Promotion region of a product row.
//!
//! Only `boosted_until` and the pending-request marker are persisted. The
//! `is_boosted` flag and the `boost_status` label are projections evaluated
//! against "now", so an elapsed window can never read as `active`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use kudimall_core::{BoostRequestId, DomainError, DomainResult};

/// Promotion label shown to vendors and admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostStatus {
    None,
    Requested,
    Active,
    Expired,
}

impl BoostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostStatus::None => "none",
            BoostStatus::Requested => "requested",
            BoostStatus::Active => "active",
            BoostStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Promotion {
    boosted_until: Option<DateTime<Utc>>,
    pending_request: Option<BoostRequestId>,
    /// Bumped on every promotion write; independent of stock writes.
    version: u64,
}

impl Promotion {
    pub fn restore(
        boosted_until: Option<DateTime<Utc>>,
        pending_request: Option<BoostRequestId>,
        version: u64,
    ) -> Self {
        Self {
            boosted_until,
            pending_request,
            version,
        }
    }

    pub fn boosted_until(&self) -> Option<DateTime<Utc>> {
        self.boosted_until
    }

    pub fn pending_request(&self) -> Option<BoostRequestId> {
        self.pending_request
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Set by an approval and never cleared by time.
    pub fn is_boosted(&self) -> bool {
        self.boosted_until.is_some()
    }

    /// The only valid "currently promoted" predicate.
    pub fn effective_boosted(&self, now: DateTime<Utc>) -> bool {
        matches!(self.boosted_until, Some(until) if until > now)
    }

    pub fn status(&self, now: DateTime<Utc>) -> BoostStatus {
        if self.pending_request.is_some() {
            BoostStatus::Requested
        } else if self.effective_boosted(now) {
            BoostStatus::Active
        } else if self.boosted_until.is_some() {
            BoostStatus::Expired
        } else {
            BoostStatus::None
        }
    }

    /// Reserve the product for a new pending request.
    pub fn request(&self, request_id: BoostRequestId) -> DomainResult<Promotion> {
        if let Some(existing) = self.pending_request {
            return Err(DomainError::conflict(format!(
                "boost request {existing} is already pending for this product"
            )));
        }
        Ok(Promotion {
            boosted_until: self.boosted_until,
            pending_request: Some(request_id),
            version: self.version + 1,
        })
    }

    /// Open the boost window: `approved_at + duration_days`.
    pub fn approve(
        &self,
        request_id: BoostRequestId,
        approved_at: DateTime<Utc>,
        duration_days: u32,
    ) -> DomainResult<Promotion> {
        self.ensure_pending(request_id)?;
        Ok(Promotion {
            boosted_until: Some(approved_at + Duration::days(i64::from(duration_days))),
            pending_request: None,
            version: self.version + 1,
        })
    }

    pub fn reject(&self, request_id: BoostRequestId) -> DomainResult<Promotion> {
        self.ensure_pending(request_id)?;
        Ok(Promotion {
            boosted_until: self.boosted_until,
            pending_request: None,
            version: self.version + 1,
        })
    }

    fn ensure_pending(&self, request_id: BoostRequestId) -> DomainResult<()> {
        match self.pending_request {
            Some(pending) if pending == request_id => Ok(()),
            Some(pending) => Err(DomainError::conflict(format!(
                "product is reserved by boost request {pending}, not {request_id}"
            ))),
            None => Err(DomainError::conflict(format!(
                "boost request {request_id} is not pending on this product"
            ))),
        }
    }
}
