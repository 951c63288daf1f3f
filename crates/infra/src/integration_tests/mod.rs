//! Service-level integration tests.
//!
//! Tests: Service → MarketplaceStore → EventBus, wired exactly as the API wires
//! them, with a manually driven clock.
//!
//! Verifies:
//! - Same-product decrements serialize through the stock compare-and-swap
//! - Orders never exist without their items, and failed payments touch nothing
//! - The boost lifecycle, its expiry and the featured-slot cap

mod ledger;
mod orders;
mod promotion;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use kudimall_auth::Principal;
use kudimall_catalog::{BoostPlan, BoostRequest, BoostRequestStatus, Product};
use kudimall_core::{
    BoostPlanId, BoostRequestId, Clock, ExpectedVersion, FixedClock, Money, OrderId, ProductId,
    UserId, VendorId,
};
use kudimall_events::InMemoryEventBus;
use kudimall_sales::{
    CartLine, InventoryStatus, Order, OrderStatus, PaymentMethod, PlaceOrder, ShippingAddress,
};

use crate::cart::InMemoryCartStore;
use crate::config::InventoryConfig;
use crate::notify::{NotifyError, OrderConfirmation, OrderNotifier};
use crate::services::{InventoryLedger, MarketBus, OrderService, PromotionService};
use crate::store::{
    BoostRequestPage, InMemoryStore, MarketplaceStore, Pagination, StoreError, StoreResult,
};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub(crate) fn accra() -> ShippingAddress {
    ShippingAddress {
        street: "12 Oxford Street".to_string(),
        city: "Accra".to_string(),
        region: "Greater Accra".to_string(),
        postal_code: None,
        country: "Ghana".to_string(),
    }
}

pub(crate) fn line(product: &Product, quantity: i64) -> CartLine {
    CartLine {
        product_id: product.id(),
        quantity,
        price_snapshot: product.price(),
    }
}

pub(crate) fn checkout(user_id: UserId, items: Vec<CartLine>, status: OrderStatus) -> PlaceOrder {
    PlaceOrder {
        user_id,
        items,
        shipping_address: accra(),
        payment_method: PaymentMethod::MtnMomo,
        transaction_id: Some("MOMO-123456".to_string()),
        initial_status: status,
        customer_name: None,
        customer_phone: "024 123 4567".to_string(),
    }
}

/// Captures confirmations instead of sending them.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<OrderConfirmation>>,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<OrderConfirmation> {
        self.sent.lock().unwrap().clone()
    }

    /// Confirmations are spawned; poll briefly until `count` have arrived.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<OrderConfirmation> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("expected {count} confirmation(s), got {:?}", self.sent());
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn notify_order_confirmed(
        &self,
        confirmation: OrderConfirmation,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(confirmation);
        Ok(())
    }
}

/// Wraps `InMemoryStore`, failing every stock compare-and-swap on one product.
pub(crate) struct FlakyStore {
    inner: InMemoryStore,
    product_id: Mutex<Option<ProductId>>,
    error: StoreError,
    cas_calls: AtomicU32,
}

impl FlakyStore {
    pub(crate) fn new(error: StoreError) -> Self {
        Self {
            inner: InMemoryStore::new(),
            product_id: Mutex::new(None),
            error,
            cas_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn break_stock_of(&self, product_id: ProductId) {
        *self.product_id.lock().unwrap() = Some(product_id);
    }

    pub(crate) fn cas_calls(&self) -> u32 {
        self.cas_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketplaceStore for FlakyStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        self.inner.insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn compare_and_set_stock(
        &self,
        id: ProductId,
        expected_stock: i64,
        new_stock: i64,
    ) -> StoreResult<()> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        let broken = *self.product_id.lock().unwrap();
        if broken == Some(id) {
            return Err(self.error.clone());
        }
        self.inner
            .compare_and_set_stock(id, expected_stock, new_stock)
            .await
    }

    async fn set_stock(&self, id: ProductId, stock: i64) -> StoreResult<i64> {
        self.inner.set_stock(id, stock).await
    }

    async fn update_price(&self, id: ProductId, price: Money) -> StoreResult<()> {
        self.inner.update_price(id, price).await
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        self.inner.insert_order(order).await
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        self.inner.orders_for_user(user_id).await
    }

    async fn update_order_status(
        &self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        self.inner.update_order_status(order, expected).await
    }

    async fn set_inventory_status(&self, id: OrderId, status: InventoryStatus) -> StoreResult<()> {
        self.inner.set_inventory_status(id, status).await
    }

    async fn insert_plan(&self, plan: &BoostPlan) -> StoreResult<()> {
        self.inner.insert_plan(plan).await
    }

    async fn get_plan(&self, id: BoostPlanId) -> StoreResult<Option<BoostPlan>> {
        self.inner.get_plan(id).await
    }

    async fn list_plans(&self) -> StoreResult<Vec<BoostPlan>> {
        self.inner.list_plans().await
    }

    async fn update_plan(&self, plan: &BoostPlan) -> StoreResult<()> {
        self.inner.update_plan(plan).await
    }

    async fn create_boost_request(&self, request: &BoostRequest) -> StoreResult<Product> {
        self.inner.create_boost_request(request).await
    }

    async fn get_boost_request(&self, id: BoostRequestId) -> StoreResult<Option<BoostRequest>> {
        self.inner.get_boost_request(id).await
    }

    async fn list_boost_requests(
        &self,
        status: Option<BoostRequestStatus>,
        pagination: Pagination,
    ) -> StoreResult<BoostRequestPage> {
        self.inner.list_boost_requests(status, pagination).await
    }

    async fn approve_boost(
        &self,
        id: BoostRequestId,
        approved_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)> {
        self.inner.approve_boost(id, approved_at).await
    }

    async fn reject_boost(
        &self,
        id: BoostRequestId,
        rejected_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)> {
        self.inner.reject_boost(id, rejected_at).await
    }

    async fn max_boosted_products(&self) -> StoreResult<Option<u32>> {
        self.inner.max_boosted_products().await
    }

    async fn set_max_boosted_products(&self, limit: Option<u32>) -> StoreResult<()> {
        self.inner.set_max_boosted_products(limit).await
    }
}

/// Services wired over one store, bus and clock.
pub(crate) struct Harness {
    pub store: Arc<dyn MarketplaceStore>,
    pub bus: MarketBus,
    pub clock: Arc<FixedClock>,
    pub carts: Arc<InMemoryCartStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub ledger: Arc<InventoryLedger<MarketBus>>,
    pub orders: OrderService<MarketBus>,
    pub promotions: PromotionService<MarketBus>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), &InventoryConfig::default())
    }

    pub(crate) fn with_store(store: Arc<dyn MarketplaceStore>, config: &InventoryConfig) -> Self {
        kudimall_observability::init_pretty();

        let bus: MarketBus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let carts = Arc::new(InMemoryCartStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let ledger = Arc::new(InventoryLedger::new(
            store.clone(),
            bus.clone(),
            dyn_clock.clone(),
            config,
        ));
        let orders = OrderService::new(
            store.clone(),
            ledger.clone(),
            carts.clone(),
            notifier.clone(),
            bus.clone(),
            dyn_clock.clone(),
        );
        let promotions = PromotionService::new(store.clone(), bus.clone(), dyn_clock);

        Self {
            store,
            bus,
            clock,
            carts,
            notifier,
            ledger,
            orders,
            promotions,
        }
    }

    pub(crate) async fn seed_product(&self, vendor_id: VendorId, price_minor: u64, stock: i64) -> Product {
        let product = Product::new(
            ProductId::new(),
            vendor_id,
            "Kente stole",
            Money::from_minor(price_minor),
            stock,
        )
        .unwrap();
        self.store.insert_product(&product).await.unwrap();
        product
    }

    pub(crate) async fn seed_plan(&self, days: u32) -> BoostPlan {
        let plan = BoostPlan::new(
            BoostPlanId::new(),
            format!("{days}-day spotlight"),
            None,
            days,
            Money::from_minor(2_500),
        )
        .unwrap();
        self.store.insert_plan(&plan).await.unwrap();
        plan
    }

    pub(crate) async fn stock(&self, product_id: ProductId) -> i64 {
        self.ledger.stock_of(product_id).await.unwrap()
    }

    pub(crate) async fn product(&self, product_id: ProductId) -> Product {
        self.store.get_product(product_id).await.unwrap().unwrap()
    }
}

pub(crate) fn vendor() -> Principal {
    Principal::vendor(UserId::new(), VendorId::new())
}

pub(crate) fn owner_vendor_id(principal: &Principal) -> VendorId {
    principal.vendor_id.unwrap()
}

pub(crate) fn admin() -> Principal {
    Principal::admin(UserId::new())
}

pub(crate) fn customer() -> Principal {
    Principal::customer(UserId::new())
}
