//! Order placement and fulfillment.
//!
//! ## Placement pipeline
//!
//! ```text
//! PlaceOrder
//!   ↓
//! 1. Authorize + validate (cart, address): nothing written yet
//!   ↓
//! 2. Insert order + items (one atomic store call)
//!   ↓  failure status (Payment Failed / Cancelled) stops here
//! 3. Decrement stock per item (each independently, CAS + retry)
//!   ↓
//! 4. Record inventory_status (adjusted | needs_reconciliation)
//!   ↓
//! 5. Clear cart, spawn confirmation (skipped without a usable phone),
//!    publish sales.order.placed
//! ```
//!
//! A failed decrement never rolls back the order; the order is flagged
//! `needs_reconciliation` instead.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{error, info, instrument, warn};

use kudimall_auth::{Permission, Principal, authorize, ensure_vendor};
use kudimall_core::{Clock, ExpectedVersion, OrderId, ProductId, UserId};
use kudimall_events::{EventBus, EventEnvelope, publish_best_effort};
use kudimall_sales::{
    InventoryStatus, Order, OrderEvent, OrderPlaced, OrderStatus, OrderStatusChanged, PlaceOrder,
};

use crate::cart::CartStore;
use crate::error::{ServiceError, ServiceResult};
use crate::notify::{OrderConfirmation, OrderNotifier};
use crate::services::ORDER_AGGREGATE;
use crate::services::ledger::{DecrementOutcome, InventoryLedger};
use crate::store::MarketplaceStore;

/// What happened to one order line's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdjustmentOutcome {
    Decremented(DecrementOutcome),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdjustment {
    pub product_id: ProductId,
    pub quantity: i64,
    pub outcome: AdjustmentOutcome,
}

impl ItemAdjustment {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AdjustmentOutcome::Decremented(_))
    }
}

/// The committed order plus the per-item stock outcomes.
///
/// `adjustments` is empty for failed-payment orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementReceipt {
    pub order: Order,
    pub adjustments: Vec<ItemAdjustment>,
}

pub struct OrderService<B> {
    store: Arc<dyn MarketplaceStore>,
    ledger: Arc<InventoryLedger<B>>,
    carts: Arc<dyn CartStore>,
    notifier: Arc<dyn OrderNotifier>,
    bus: B,
    clock: Arc<dyn Clock>,
}

impl<B> OrderService<B> {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        ledger: Arc<InventoryLedger<B>>,
        carts: Arc<dyn CartStore>,
        notifier: Arc<dyn OrderNotifier>,
        bus: B,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            carts,
            notifier,
            bus,
            clock,
        }
    }
}

impl<B> OrderService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[instrument(skip(self, principal, cmd), fields(user_id = %cmd.user_id, status = %cmd.initial_status), err(level = "warn"))]
    pub async fn place_order(
        &self,
        principal: &Principal,
        cmd: PlaceOrder,
    ) -> ServiceResult<PlacementReceipt> {
        authorize(principal, &Permission::ORDERS_PLACE)?;
        if principal.user_id != cmd.user_id && !principal.is_admin() {
            return Err(ServiceError::forbidden(
                "orders can only be placed for the signed-in customer",
            ));
        }

        // Everything that can be rejected is rejected before the first write.
        cmd.validate()?;

        let mut names: HashMap<ProductId, String> = HashMap::new();
        for line in &cmd.items {
            if names.contains_key(&line.product_id) {
                continue;
            }
            if let Some(product) = self.store.get_product(line.product_id).await? {
                names.insert(line.product_id, product.name().to_string());
            }
        }

        let mut order = Order::place(OrderId::new(), &cmd, self.clock.now(), |id| {
            names.get(&id).cloned()
        })?;
        self.store.insert_order(&order).await?;
        info!(
            order_id = %order.id,
            total_pesewas = order.total_amount.minor_units(),
            item_count = order.items.len(),
            "order created"
        );

        if order.status.is_payment_failure() {
            info!(order_id = %order.id, status = %order.status, "payment failed; inventory untouched");
            self.publish_placed(&order);
            return Ok(PlacementReceipt {
                order,
                adjustments: Vec::new(),
            });
        }

        let mut adjustments = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let outcome = match self
                .ledger
                .decrement_stock(item.product_id, item.quantity, Some(order.id))
                .await
            {
                Ok(outcome) => AdjustmentOutcome::Decremented(outcome),
                Err(err) => {
                    error!(
                        order_id = %order.id,
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %err,
                        "stock decrement failed; order kept"
                    );
                    AdjustmentOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            adjustments.push(ItemAdjustment {
                product_id: item.product_id,
                quantity: item.quantity,
                outcome,
            });
        }

        let inventory_status = if adjustments.iter().all(ItemAdjustment::succeeded) {
            InventoryStatus::Adjusted
        } else {
            InventoryStatus::NeedsReconciliation
        };
        match self
            .store
            .set_inventory_status(order.id, inventory_status)
            .await
        {
            Ok(()) => order.inventory_status = inventory_status,
            Err(err) => warn!(
                order_id = %order.id,
                error = %err,
                "failed to record inventory status; order stays flagged for reconciliation"
            ),
        }

        if let Err(err) = self.carts.clear(order.user_id).await {
            warn!(user_id = %order.user_id, error = %err, "failed to clear cart");
        }

        match cmd.recipient() {
            Ok(recipient) => self.spawn_confirmation(OrderConfirmation {
                order_id: order.id,
                customer_name: recipient.name,
                customer_phone: recipient.phone,
                total_amount: order.total_amount,
            }),
            Err(err) => warn!(
                order_id = %order.id,
                error = %err,
                "no usable phone number; confirmation skipped"
            ),
        }
        self.publish_placed(&order);

        Ok(PlacementReceipt { order, adjustments })
    }

    fn spawn_confirmation(&self, confirmation: OrderConfirmation) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let order_id = confirmation.order_id;
            if let Err(err) = notifier.notify_order_confirmed(confirmation).await {
                warn!(%order_id, error = %err, "order confirmation failed");
            }
        });
    }

    fn publish_placed(&self, order: &Order) {
        let event = OrderEvent::OrderPlaced(OrderPlaced {
            order_id: order.id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status,
            item_count: order.items.len(),
            inventory_status: order.inventory_status,
            occurred_at: order.order_date,
        });
        publish_best_effort(&self.bus, *order.id.as_uuid(), ORDER_AGGREGATE, &event);
    }

    pub async fn get_order(&self, principal: &Principal, order_id: OrderId) -> ServiceResult<Order> {
        let order = self.load(order_id).await?;
        self.ensure_can_view(principal, &order).await?;
        Ok(order)
    }

    /// Newest first.
    pub async fn orders_for_user(
        &self,
        principal: &Principal,
        user_id: UserId,
    ) -> ServiceResult<Vec<Order>> {
        if principal.user_id == user_id {
            authorize(principal, &Permission::ORDERS_READ_OWN)?;
        } else {
            authorize(principal, &Permission::ORDERS_READ_ALL)?;
        }
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Move an order forward in its fulfillment lifecycle.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err(level = "warn"))]
    pub async fn update_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        next: OrderStatus,
    ) -> ServiceResult<Order> {
        authorize(principal, &Permission::ORDERS_FULFILL)?;
        let order = self.load(order_id).await?;
        if !principal.is_admin() {
            self.ensure_sells_in(principal, &order).await?;
        }

        let updated = order.transition_to(next)?;
        self.store
            .update_order_status(&updated, ExpectedVersion::Exact(order.version))
            .await?;
        info!(%order_id, from = %order.status, to = %updated.status, "order status updated");

        let event = OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id,
            from: order.status,
            to: updated.status,
            changed_by: principal.user_id,
            occurred_at: self.clock.now(),
        });
        publish_best_effort(&self.bus, *order_id.as_uuid(), ORDER_AGGREGATE, &event);

        Ok(updated)
    }

    async fn load(&self, order_id: OrderId) -> ServiceResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))
    }

    async fn ensure_can_view(&self, principal: &Principal, order: &Order) -> ServiceResult<()> {
        if authorize(principal, &Permission::ORDERS_READ_ALL).is_ok() {
            return Ok(());
        }
        if order.belongs_to(principal.user_id) {
            authorize(principal, &Permission::ORDERS_READ_OWN)?;
            return Ok(());
        }
        if authorize(principal, &Permission::ORDERS_FULFILL).is_ok() {
            return self.ensure_sells_in(principal, order).await;
        }
        Err(ServiceError::forbidden(format!(
            "order {} belongs to another customer",
            order.id
        )))
    }

    /// The vendor must own at least one product in the order.
    async fn ensure_sells_in(&self, principal: &Principal, order: &Order) -> ServiceResult<()> {
        for item in &order.items {
            if let Some(product) = self.store.get_product(item.product_id).await? {
                if ensure_vendor(principal, product.vendor_id()).is_ok() {
                    return Ok(());
                }
            }
        }
        Err(ServiceError::forbidden(format!(
            "caller sells no product in order {}",
            order.id
        )))
    }
}
