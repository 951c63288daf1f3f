//! Paid product promotion ("boost") workflow.
//!
//! ```text
//! none → requested → approved → active → expired
//!                  ↘ rejected → none
//! ```
//!
//! Expiry is never swept: `active` vs `expired` is computed from
//! `boosted_until` against the clock at read time.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use kudimall_auth::{Permission, Principal, authorize, ensure_vendor};
use kudimall_catalog::{
    BoostApproved, BoostPlan, BoostPlanChanges, BoostRejected, BoostRequest, BoostRequestStatus,
    BoostRequested, BoostStatus, Product, PromotionEvent, featured_products,
};
use kudimall_core::{BoostPlanId, BoostRequestId, Clock, Money, ProductId};
use kudimall_events::{EventBus, EventEnvelope, publish_best_effort};

use crate::error::{ServiceError, ServiceResult};
use crate::services::PRODUCT_AGGREGATE;
use crate::store::{BoostRequestPage, MarketplaceStore, Pagination};

/// A decided boost request and the product as it now reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostDecision {
    pub request: BoostRequest,
    pub product: Product,
}

pub struct PromotionService<B> {
    store: Arc<dyn MarketplaceStore>,
    bus: B,
    clock: Arc<dyn Clock>,
}

impl<B> PromotionService<B> {
    pub fn new(store: Arc<dyn MarketplaceStore>, bus: B, clock: Arc<dyn Clock>) -> Self {
        Self { store, bus, clock }
    }
}

impl<B> PromotionService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Vendor asks to promote one of their products under `plan_id`.
    ///
    /// Fails with `Conflict` if the product already has a pending request.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn request_boost(
        &self,
        principal: &Principal,
        product_id: ProductId,
        plan_id: BoostPlanId,
    ) -> ServiceResult<BoostRequest> {
        authorize(principal, &Permission::BOOST_REQUEST)?;

        let product = self.product(product_id).await?;
        ensure_vendor(principal, product.vendor_id())?;
        let plan = self.plan(plan_id).await?;

        let request = BoostRequest::pending(
            BoostRequestId::new(),
            product_id,
            product.vendor_id(),
            principal.user_id,
            &plan,
            self.clock.now(),
        )?;
        self.store.create_boost_request(&request).await?;
        info!(request_id = %request.id, %product_id, days = plan.duration_days, "boost requested");

        self.publish(&PromotionEvent::BoostRequested(BoostRequested {
            request_id: request.id,
            product_id,
            vendor_id: request.vendor_id,
            requested_by: principal.user_id,
            plan_duration_days: request.plan_duration_days,
            occurred_at: request.created_at,
        }));
        Ok(request)
    }

    /// Admin approval: opens the window `now .. now + duration_days`.
    ///
    /// The featured-slot cap is checked in the same store transaction.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn approve_boost(
        &self,
        principal: &Principal,
        request_id: BoostRequestId,
    ) -> ServiceResult<BoostDecision> {
        authorize(principal, &Permission::BOOST_REVIEW)?;

        let now = self.clock.now();
        let (request, product) = self.store.approve_boost(request_id, now).await?;
        let boosted_until = product
            .boosted_until()
            .unwrap_or_else(|| now + Duration::days(i64::from(request.plan_duration_days)));
        info!(%request_id, product_id = %product.id(), %boosted_until, "boost approved");

        self.publish(&PromotionEvent::BoostApproved(BoostApproved {
            request_id,
            product_id: product.id(),
            approved_by: principal.user_id,
            boosted_until,
            occurred_at: now,
        }));
        Ok(BoostDecision { request, product })
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn reject_boost(
        &self,
        principal: &Principal,
        request_id: BoostRequestId,
    ) -> ServiceResult<BoostDecision> {
        authorize(principal, &Permission::BOOST_REVIEW)?;

        let now = self.clock.now();
        let (request, product) = self.store.reject_boost(request_id, now).await?;
        info!(%request_id, product_id = %product.id(), "boost rejected");

        self.publish(&PromotionEvent::BoostRejected(BoostRejected {
            request_id,
            product_id: product.id(),
            rejected_by: principal.user_id,
            occurred_at: now,
        }));
        Ok(BoostDecision { request, product })
    }

    fn publish(&self, event: &PromotionEvent) {
        publish_best_effort(
            &self.bus,
            *event.product_id().as_uuid(),
            PRODUCT_AGGREGATE,
            event,
        );
    }

    /// Storefront featured list, longest remaining window first.
    pub async fn featured_products(&self, limit: Option<usize>) -> ServiceResult<Vec<Product>> {
        let products = self.store.list_products().await?;
        Ok(featured_products(products, self.clock.now(), limit))
    }

    pub async fn is_effectively_boosted(&self, product_id: ProductId) -> ServiceResult<bool> {
        let product = self.product(product_id).await?;
        Ok(product.effective_boosted(self.clock.now()))
    }

    pub async fn boost_status(&self, product_id: ProductId) -> ServiceResult<BoostStatus> {
        let product = self.product(product_id).await?;
        Ok(product.boost_status(self.clock.now()))
    }

    /// Admin review queue, newest first.
    pub async fn list_boost_requests(
        &self,
        principal: &Principal,
        status: Option<BoostRequestStatus>,
        pagination: Pagination,
    ) -> ServiceResult<BoostRequestPage> {
        authorize(principal, &Permission::BOOST_REVIEW)?;
        Ok(self.store.list_boost_requests(status, pagination).await?)
    }

    pub async fn active_plans(&self) -> ServiceResult<Vec<BoostPlan>> {
        let plans = self.store.list_plans().await?;
        Ok(plans.into_iter().filter(|p| p.is_active).collect())
    }

    #[instrument(skip(self, principal, description), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn create_plan(
        &self,
        principal: &Principal,
        name: &str,
        description: Option<String>,
        duration_days: u32,
        price: Money,
    ) -> ServiceResult<BoostPlan> {
        authorize(principal, &Permission::SETTINGS_EDIT)?;
        let plan = BoostPlan::new(BoostPlanId::new(), name, description, duration_days, price)?;
        self.store.insert_plan(&plan).await?;
        info!(plan_id = %plan.id, days = plan.duration_days, "boost plan created");
        Ok(plan)
    }

    /// Every plan, retired ones included (admin settings screen).
    pub async fn all_plans(&self, principal: &Principal) -> ServiceResult<Vec<BoostPlan>> {
        authorize(principal, &Permission::SETTINGS_EDIT)?;
        Ok(self.store.list_plans().await?)
    }

    /// Edit a plan. Pending and decided requests keep the duration and price
    /// they copied when they were made.
    #[instrument(skip(self, principal, changes), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn update_plan(
        &self,
        principal: &Principal,
        plan_id: BoostPlanId,
        changes: BoostPlanChanges,
    ) -> ServiceResult<BoostPlan> {
        authorize(principal, &Permission::SETTINGS_EDIT)?;
        let plan = self.plan(plan_id).await?.apply(changes)?;
        self.store.update_plan(&plan).await?;
        info!(%plan_id, days = plan.duration_days, active = plan.is_active, "boost plan updated");
        Ok(plan)
    }

    /// Retire a plan so it can no longer back new requests.
    pub async fn deactivate_plan(
        &self,
        principal: &Principal,
        plan_id: BoostPlanId,
    ) -> ServiceResult<BoostPlan> {
        self.update_plan(
            principal,
            plan_id,
            BoostPlanChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// `None` removes the cap.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn set_max_boosted_products(
        &self,
        principal: &Principal,
        limit: Option<u32>,
    ) -> ServiceResult<()> {
        authorize(principal, &Permission::SETTINGS_EDIT)?;
        self.store.set_max_boosted_products(limit).await?;
        info!(?limit, "featured-slot cap updated");
        Ok(())
    }

    pub async fn max_boosted_products(&self) -> ServiceResult<Option<u32>> {
        Ok(self.store.max_boosted_products().await?)
    }

    async fn plan(&self, plan_id: BoostPlanId) -> ServiceResult<BoostPlan> {
        self.store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("boost plan {plan_id}")))
    }

    async fn product(&self, product_id: ProductId) -> ServiceResult<Product> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))
    }
}
