use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kudimall_core::{
    BoostRequestId, DomainError, DomainResult, Money, ProductId, UserId, VendorId,
};

use crate::plan::BoostPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl BoostRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostRequestStatus::Pending => "pending",
            BoostRequestStatus::Approved => "approved",
            BoostRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BoostRequestStatus::Pending),
            "approved" => Some(BoostRequestStatus::Approved),
            "rejected" => Some(BoostRequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A vendor's request to promote one product.
///
/// Plan duration and price are copied at request time so later plan edits do
/// not change what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRequest {
    pub id: BoostRequestId,
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub user_id: UserId,
    pub plan_duration_days: u32,
    pub plan_price: Money,
    pub status: BoostRequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl BoostRequest {
    pub fn pending(
        id: BoostRequestId,
        product_id: ProductId,
        vendor_id: VendorId,
        user_id: UserId,
        plan: &BoostPlan,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        plan.ensure_available()?;
        Ok(Self {
            id,
            product_id,
            vendor_id,
            user_id,
            plan_duration_days: plan.duration_days,
            plan_price: plan.price,
            status: BoostRequestStatus::Pending,
            created_at,
            decided_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == BoostRequestStatus::Pending
    }

    pub fn approve(&self, at: DateTime<Utc>) -> DomainResult<BoostRequest> {
        self.decide(BoostRequestStatus::Approved, at)
    }

    pub fn reject(&self, at: DateTime<Utc>) -> DomainResult<BoostRequest> {
        self.decide(BoostRequestStatus::Rejected, at)
    }

    // Approved and rejected are terminal.
    fn decide(&self, to: BoostRequestStatus, at: DateTime<Utc>) -> DomainResult<BoostRequest> {
        if !self.is_pending() {
            return Err(DomainError::conflict(format!(
                "boost request {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        let mut next = self.clone();
        next.status = to;
        next.decided_at = Some(at);
        Ok(next)
    }
}
