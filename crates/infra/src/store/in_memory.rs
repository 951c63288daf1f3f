use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use kudimall_catalog::{
    BoostCap, BoostPlan, BoostRequest, BoostRequestStatus, Product, count_effectively_boosted,
};
use kudimall_core::{
    BoostPlanId, BoostRequestId, DomainError, ExpectedVersion, Money, OrderId, ProductId, UserId,
};
use kudimall_inventory::validate_stock_level;
use kudimall_sales::{InventoryStatus, Order};

use super::{
    BoostRequestPage, MarketplaceStore, Pagination, StoreError, StoreResult, decide_approval,
    decide_rejection,
};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    plans: HashMap<BoostPlanId, BoostPlan>,
    boost_requests: HashMap<BoostRequestId, BoostRequest>,
    max_boosted_products: Option<u32>,
}

impl State {
    fn product(&self, id: ProductId) -> StoreResult<&Product> {
        self.products
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))
    }

    fn boost_request(&self, id: BoostRequestId) -> StoreResult<&BoostRequest> {
        self.boost_requests
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("boost request {id}")))
    }
}

/// In-memory marketplace store.
///
/// Intended for tests/dev. One lock guards every table, so each trait call is
/// trivially atomic; the compare-and-swap checks still run so lost races
/// surface exactly as they would against Postgres.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.products.contains_key(&product.id()) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id()
            )));
        }
        state.products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = self.read()?.products.values().cloned().collect();
        products.sort_by_key(|p| *p.id().as_uuid());
        Ok(products)
    }

    async fn compare_and_set_stock(
        &self,
        id: ProductId,
        expected_stock: i64,
        new_stock: i64,
    ) -> StoreResult<()> {
        validate_stock_level(new_stock)?;
        let mut state = self.write()?;
        let current = state.product(id)?.stock();
        if current != expected_stock {
            return Err(StoreError::Concurrency(format!(
                "stock of product {id} changed (expected {expected_stock}, found {current})"
            )));
        }
        if let Some(product) = state.products.remove(&id) {
            state.products.insert(id, product.with_stock(new_stock));
        }
        Ok(())
    }

    async fn set_stock(&self, id: ProductId, stock: i64) -> StoreResult<i64> {
        validate_stock_level(stock)?;
        let mut state = self.write()?;
        let previous = state.product(id)?.stock();
        if let Some(product) = state.products.remove(&id) {
            state.products.insert(id, product.with_stock(stock));
        }
        Ok(previous)
    }

    async fn update_price(&self, id: ProductId, price: Money) -> StoreResult<()> {
        let mut state = self.write()?;
        state.product(id)?;
        if let Some(product) = state.products.remove(&id) {
            state.products.insert(id, product.with_price(price));
        }
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        if order.items.is_empty() {
            return Err(DomainError::invariant("an order must have at least one item").into());
        }
        let mut state = self.write()?;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        for item in &order.items {
            state.product(item.product_id)?;
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .read()?
            .orders
            .values()
            .filter(|o| o.belongs_to(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let stored = state
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order.id)))?;
        if !expected.matches(stored.version) {
            return Err(StoreError::Concurrency(format!(
                "order {} is at version {}, expected {expected:?}",
                order.id, stored.version
            )));
        }
        stored.status = order.status;
        stored.version = order.version;
        Ok(())
    }

    async fn set_inventory_status(&self, id: OrderId, status: InventoryStatus) -> StoreResult<()> {
        let mut state = self.write()?;
        let stored = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;
        stored.inventory_status = status;
        Ok(())
    }

    async fn insert_plan(&self, plan: &BoostPlan) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.plans.contains_key(&plan.id) {
            return Err(StoreError::Conflict(format!("boost plan {} already exists", plan.id)));
        }
        state.plans.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn get_plan(&self, id: BoostPlanId) -> StoreResult<Option<BoostPlan>> {
        Ok(self.read()?.plans.get(&id).cloned())
    }

    async fn list_plans(&self) -> StoreResult<Vec<BoostPlan>> {
        let mut plans: Vec<BoostPlan> = self.read()?.plans.values().cloned().collect();
        plans.sort_by(|a, b| {
            a.duration_days
                .cmp(&b.duration_days)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(plans)
    }

    async fn update_plan(&self, plan: &BoostPlan) -> StoreResult<()> {
        let mut state = self.write()?;
        let stored = state
            .plans
            .get_mut(&plan.id)
            .ok_or_else(|| StoreError::NotFound(format!("boost plan {}", plan.id)))?;
        *stored = plan.clone();
        Ok(())
    }

    async fn create_boost_request(&self, request: &BoostRequest) -> StoreResult<Product> {
        let mut state = self.write()?;
        let product = state.product(request.product_id)?;
        let promotion = product.promotion().request(request.id)?;
        let updated = product.clone().with_promotion(promotion);

        state.products.insert(updated.id(), updated.clone());
        state.boost_requests.insert(request.id, request.clone());
        Ok(updated)
    }

    async fn get_boost_request(&self, id: BoostRequestId) -> StoreResult<Option<BoostRequest>> {
        Ok(self.read()?.boost_requests.get(&id).cloned())
    }

    async fn list_boost_requests(
        &self,
        status: Option<BoostRequestStatus>,
        pagination: Pagination,
    ) -> StoreResult<BoostRequestPage> {
        let mut requests: Vec<BoostRequest> = self
            .read()?
            .boost_requests
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });

        let total = requests.len() as u64;
        let page = requests
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(BoostRequestPage::new(page, total, pagination))
    }

    async fn approve_boost(
        &self,
        id: BoostRequestId,
        approved_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)> {
        let mut state = self.write()?;
        let request = state.boost_request(id)?;
        let product = state.product(request.product_id)?;
        let already_boosted = count_effectively_boosted(
            state.products.values(),
            approved_at,
            Some(product.id()),
        );
        let cap = BoostCap::new(state.max_boosted_products);

        let (request, product) = decide_approval(request, product, already_boosted, cap, approved_at)?;
        state.boost_requests.insert(request.id, request.clone());
        state.products.insert(product.id(), product.clone());
        Ok((request, product))
    }

    async fn reject_boost(
        &self,
        id: BoostRequestId,
        rejected_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)> {
        let mut state = self.write()?;
        let request = state.boost_request(id)?;
        let product = state.product(request.product_id)?;

        let (request, product) = decide_rejection(request, product, rejected_at)?;
        state.boost_requests.insert(request.id, request.clone());
        state.products.insert(product.id(), product.clone());
        Ok((request, product))
    }

    async fn max_boosted_products(&self) -> StoreResult<Option<u32>> {
        Ok(self.read()?.max_boosted_products)
    }

    async fn set_max_boosted_products(&self, limit: Option<u32>) -> StoreResult<()> {
        self.write()?.max_boosted_products = limit;
        Ok(())
    }
}
