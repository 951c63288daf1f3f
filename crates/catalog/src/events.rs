use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kudimall_core::{BoostRequestId, ProductId, UserId, VendorId};
use kudimall_events::Event;

/// Event: BoostRequested (vendor asked to promote a product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRequested {
    pub request_id: BoostRequestId,
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub requested_by: UserId,
    pub plan_duration_days: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BoostApproved (promotion window opened).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostApproved {
    pub request_id: BoostRequestId,
    pub product_id: ProductId,
    pub approved_by: UserId,
    pub boosted_until: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BoostRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRejected {
    pub request_id: BoostRequestId,
    pub product_id: ProductId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionEvent {
    BoostRequested(BoostRequested),
    BoostApproved(BoostApproved),
    BoostRejected(BoostRejected),
}

impl PromotionEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            PromotionEvent::BoostRequested(e) => e.product_id,
            PromotionEvent::BoostApproved(e) => e.product_id,
            PromotionEvent::BoostRejected(e) => e.product_id,
        }
    }
}

impl Event for PromotionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PromotionEvent::BoostRequested(_) => "catalog.boost.requested",
            PromotionEvent::BoostApproved(_) => "catalog.boost.approved",
            PromotionEvent::BoostRejected(_) => "catalog.boost.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PromotionEvent::BoostRequested(e) => e.occurred_at,
            PromotionEvent::BoostApproved(e) => e.occurred_at,
            PromotionEvent::BoostRejected(e) => e.occurred_at,
        }
    }
}
