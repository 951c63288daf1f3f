//! Inventory ledger: the only writer of `Product.stock`.
//!
//! Decrements are read → compute → compare-and-swap keyed on the observed
//! stock. A lost race is retried from a fresh read, so two concurrent sales
//! never both subtract from the same stale value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};

use kudimall_auth::{Permission, Principal, authorize, ensure_vendor};
use kudimall_core::{Clock, OrderId, ProductId};
use kudimall_events::{EventBus, EventEnvelope, publish_best_effort};
use kudimall_inventory::{
    InventoryEvent, LowStockPolicy, StockDecrement, StockDecremented, StockSet,
    validate_stock_level,
};

use crate::config::InventoryConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::services::PRODUCT_AGGREGATE;
use crate::store::{MarketplaceStore, StoreError};

/// Result of a committed decrement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecrementOutcome {
    pub product_id: ProductId,
    pub previous: i64,
    pub requested: i64,
    pub new_stock: i64,
    /// Units sold without stock behind them (stock was clamped at zero).
    pub clamped: i64,
    pub low_stock: bool,
    /// Compare-and-swap attempts, 1 when uncontended.
    pub attempts: u32,
}

pub struct InventoryLedger<B> {
    store: Arc<dyn MarketplaceStore>,
    bus: B,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    low_stock: LowStockPolicy,
}

impl<B> InventoryLedger<B> {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        bus: B,
        clock: Arc<dyn Clock>,
        config: &InventoryConfig,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            max_retries: config.max_stock_retries.max(1),
            low_stock: LowStockPolicy::new(config.low_stock_threshold),
        }
    }

    pub fn low_stock_policy(&self) -> LowStockPolicy {
        self.low_stock
    }
}

impl<B> InventoryLedger<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Subtract `quantity` from the product's stock, clamping at zero.
    ///
    /// Retries lost compare-and-swaps up to the configured bound, then fails
    /// with `Concurrency`.
    #[instrument(skip(self), err(level = "warn"))]
    pub async fn decrement_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        order_id: Option<OrderId>,
    ) -> ServiceResult<DecrementOutcome> {
        if quantity <= 0 {
            return Err(ServiceError::Validation(format!(
                "decrement quantity must be positive (got {quantity})"
            )));
        }

        let mut attempts = 0;
        loop {
            attempts += 1;

            let product = self
                .store
                .get_product(product_id)
                .await?
                .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))?;
            let decrement = StockDecrement::compute(product_id, product.stock(), quantity)?;

            match self
                .store
                .compare_and_set_stock(product_id, decrement.previous, decrement.new_stock)
                .await
            {
                Ok(()) => return Ok(self.committed(decrement, order_id, attempts)),
                Err(StoreError::Concurrency(msg)) => {
                    if attempts >= self.max_retries {
                        warn!(%product_id, attempts, "stock decrement gave up after repeated conflicts");
                        return Err(ServiceError::Concurrency(format!(
                            "{msg}; gave up after {attempts} attempts"
                        )));
                    }
                    debug!(%product_id, attempts, "stock changed underneath us, retrying");
                    tokio::task::yield_now().await;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn committed(
        &self,
        decrement: StockDecrement,
        order_id: Option<OrderId>,
        attempts: u32,
    ) -> DecrementOutcome {
        let product_id = decrement.product_id;
        let clamped = decrement.shortfall();
        let low_stock = self.low_stock.is_low(decrement.new_stock);

        if decrement.is_clamped() {
            warn!(
                %product_id,
                previous = decrement.previous,
                requested = decrement.requested,
                shortfall = clamped,
                "oversold: stock clamped at zero"
            );
        }
        if low_stock {
            warn!(
                %product_id,
                stock = decrement.new_stock,
                threshold = self.low_stock.threshold(),
                "low stock"
            );
        }

        let event = InventoryEvent::StockDecremented(StockDecremented {
            product_id,
            order_id,
            previous: decrement.previous,
            requested: decrement.requested,
            new_stock: decrement.new_stock,
            shortfall: clamped,
            low_stock,
            occurred_at: self.clock.now(),
        });
        publish_best_effort(&self.bus, *product_id.as_uuid(), PRODUCT_AGGREGATE, &event);

        DecrementOutcome {
            product_id,
            previous: decrement.previous,
            requested: decrement.requested,
            new_stock: decrement.new_stock,
            clamped,
            low_stock,
            attempts,
        }
    }

    /// Vendor stock edit. Only the stock column is written.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn set_stock(
        &self,
        principal: &Principal,
        product_id: ProductId,
        stock: i64,
    ) -> ServiceResult<StockSet> {
        authorize(principal, &Permission::INVENTORY_EDIT)?;
        validate_stock_level(stock)?;

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))?;
        if !principal.is_admin() {
            ensure_vendor(principal, product.vendor_id())?;
        }

        let previous = self.store.set_stock(product_id, stock).await?;
        info!(%product_id, previous, stock, "stock level set");

        let change = StockSet {
            product_id,
            previous,
            new_stock: stock,
            occurred_at: self.clock.now(),
        };
        publish_best_effort(
            &self.bus,
            *product_id.as_uuid(),
            PRODUCT_AGGREGATE,
            &InventoryEvent::StockSet(change.clone()),
        );
        Ok(change)
    }

    pub async fn stock_of(&self, product_id: ProductId) -> ServiceResult<i64> {
        self.store
            .get_product(product_id)
            .await?
            .map(|p| p.stock())
            .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))
    }
}
