//! Relational store abstraction for the marketplace rows.
//!
//! Every method is one atomic store call. Multi-row operations (order + items,
//! boost request + product reservation, approval + cap check) commit together
//! or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kudimall_catalog::{BoostCap, BoostPlan, BoostRequest, BoostRequestStatus, Product};
use kudimall_core::{
    BoostPlanId, BoostRequestId, DomainError, ExpectedVersion, Money, OrderId, ProductId, UserId,
};
use kudimall_sales::{InventoryStatus, Order};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation error.
///
/// These are infrastructure outcomes (lost races, missing rows, backend
/// failures). Domain rule failures computed inside a store transaction are
/// carried through unchanged as `Domain`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Compare-and-swap or version check failed.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Page window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    /// 0-based.
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of the boost review queue, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRequestPage {
    pub requests: Vec<BoostRequest>,
    /// Matching requests across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl BoostRequestPage {
    pub(crate) fn new(requests: Vec<BoostRequest>, total: u64, pagination: Pagination) -> Self {
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);
        Self {
            requests,
            total,
            pagination,
            has_more,
        }
    }
}

#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    // Products.

    async fn insert_product(&self, product: &Product) -> StoreResult<()>;

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    async fn list_products(&self) -> StoreResult<Vec<Product>>;

    /// Write `new_stock` only if the row still holds `expected_stock`.
    ///
    /// Touches the stock column only. Fails with `Concurrency` on mismatch.
    async fn compare_and_set_stock(
        &self,
        id: ProductId,
        expected_stock: i64,
        new_stock: i64,
    ) -> StoreResult<()>;

    /// Unconditional stock overwrite; returns the previous level.
    async fn set_stock(&self, id: ProductId, stock: i64) -> StoreResult<i64>;

    async fn update_price(&self, id: ProductId, price: Money) -> StoreResult<()>;

    // Orders.

    /// Insert the order row and all of its items in one transaction.
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Newest first.
    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>>;

    /// Persist a status change computed from the order at `expected` version.
    async fn update_order_status(&self, order: &Order, expected: ExpectedVersion)
    -> StoreResult<()>;

    async fn set_inventory_status(&self, id: OrderId, status: InventoryStatus) -> StoreResult<()>;

    // Boost plans.

    async fn insert_plan(&self, plan: &BoostPlan) -> StoreResult<()>;

    async fn get_plan(&self, id: BoostPlanId) -> StoreResult<Option<BoostPlan>>;

    async fn list_plans(&self) -> StoreResult<Vec<BoostPlan>>;

    /// Overwrite an existing plan. Requests already made keep their copied
    /// duration and price.
    async fn update_plan(&self, plan: &BoostPlan) -> StoreResult<()>;

    // Boost requests.

    /// Reserve the product's promotion region and insert the pending request.
    ///
    /// Fails with a `Conflict` domain error if a request is already pending.
    async fn create_boost_request(&self, request: &BoostRequest) -> StoreResult<Product>;

    async fn get_boost_request(&self, id: BoostRequestId) -> StoreResult<Option<BoostRequest>>;

    /// Newest first.
    async fn list_boost_requests(
        &self,
        status: Option<BoostRequestStatus>,
        pagination: Pagination,
    ) -> StoreResult<BoostRequestPage>;

    /// Approve a pending request: cap check, request status and boost window
    /// in one transaction.
    async fn approve_boost(
        &self,
        id: BoostRequestId,
        approved_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)>;

    async fn reject_boost(
        &self,
        id: BoostRequestId,
        rejected_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)>;

    // Settings.

    async fn max_boosted_products(&self) -> StoreResult<Option<u32>>;

    async fn set_max_boosted_products(&self, limit: Option<u32>) -> StoreResult<()>;
}

/// Approval decision evaluated inside a store transaction.
///
/// `already_boosted` counts effectively boosted products other than the target.
pub(crate) fn decide_approval(
    request: &BoostRequest,
    product: &Product,
    already_boosted: usize,
    cap: BoostCap,
    approved_at: DateTime<Utc>,
) -> StoreResult<(BoostRequest, Product)> {
    let decided = request.approve(approved_at)?;
    cap.check(already_boosted)?;
    let promotion =
        product
            .promotion()
            .approve(request.id, approved_at, request.plan_duration_days)?;
    Ok((decided, product.clone().with_promotion(promotion)))
}

pub(crate) fn decide_rejection(
    request: &BoostRequest,
    product: &Product,
    rejected_at: DateTime<Utc>,
) -> StoreResult<(BoostRequest, Product)> {
    let decided = request.reject(rejected_at)?;
    let promotion = product.promotion().reject(request.id)?;
    Ok((decided, product.clone().with_promotion(promotion)))
}
