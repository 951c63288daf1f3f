use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kudimall_core::{AggregateRoot, DomainError, DomainResult, Money, OrderId, ProductId, UserId};

use crate::address::{Recipient, ShippingAddress};
use crate::payment::PaymentMethod;
use crate::status::{InventoryStatus, OrderStatus};

/// Cart line as submitted at checkout. `price_snapshot` is the unit price the
/// customer saw and becomes the item's `price_at_purchase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price_snapshot: Money,
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub initial_status: OrderStatus,
    pub customer_name: Option<String>,
    pub customer_phone: String,
}

impl PlaceOrder {
    /// Check the command and return the order total.
    ///
    /// Runs before anything is persisted; a failure here leaves no trace.
    pub fn validate(&self) -> DomainResult<Money> {
        if self.items.is_empty() {
            return Err(DomainError::validation("cart is empty"));
        }
        if !self.initial_status.is_valid_initial() {
            return Err(DomainError::validation(format!(
                "orders cannot be placed as '{}'",
                self.initial_status
            )));
        }
        self.shipping_address.validate()?;

        self.items.iter().try_fold(Money::ZERO, |total, line| {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for product {} must be positive (got {})",
                    line.product_id, line.quantity
                )));
            }
            total.checked_add(line.price_snapshot.checked_times(line.quantity)?)
        })
    }

    /// Confirmation recipient. Not part of `validate`: an unusable phone
    /// number only skips the confirmation.
    pub fn recipient(&self) -> DomainResult<Recipient> {
        Recipient::new(self.customer_name.as_deref(), &self.customer_phone)
    }

    pub fn is_payment_failure(&self) -> bool {
        self.initial_status.is_payment_failure()
    }
}

/// Line of a placed order. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_purchase: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> DomainResult<Money> {
        self.price_at_purchase.checked_times(self.quantity)
    }
}

/// Aggregate root: Order (with its items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub inventory_status: InventoryStatus,
    pub items: Vec<OrderItem>,
    pub version: u64,
}

impl Order {
    /// Build the order and its items from a checkout command.
    ///
    /// `product_name` resolves the display name snapshot for each line; an
    /// unknown product fails the whole placement.
    pub fn place<F>(
        id: OrderId,
        cmd: &PlaceOrder,
        order_date: DateTime<Utc>,
        product_name: F,
    ) -> DomainResult<Order>
    where
        F: Fn(ProductId) -> Option<String>,
    {
        let total_amount = cmd.validate()?;

        let items = cmd
            .items
            .iter()
            .map(|line| -> DomainResult<OrderItem> {
                let name = product_name(line.product_id)
                    .ok_or_else(|| DomainError::not_found(format!("product {}", line.product_id)))?;
                Ok(OrderItem {
                    order_id: id,
                    product_id: line.product_id,
                    product_name: name,
                    quantity: line.quantity,
                    price_at_purchase: line.price_snapshot,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let inventory_status = if cmd.is_payment_failure() {
            InventoryStatus::NotApplicable
        } else {
            // Provisional: flipped to `Adjusted` once every item's stock is decremented.
            InventoryStatus::NeedsReconciliation
        };

        Ok(Order {
            id,
            user_id: cmd.user_id,
            total_amount,
            status: cmd.initial_status,
            order_date,
            shipping_address: cmd.shipping_address.clone(),
            payment_method: cmd.payment_method,
            transaction_id: cmd.transaction_id.clone(),
            inventory_status,
            items,
            version: 1,
        })
    }

    /// Next state after a fulfillment update.
    pub fn transition_to(&self, next: OrderStatus) -> DomainResult<Order> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::conflict(format!(
                "order {} cannot move from '{}' to '{}'",
                self.id, self.status, next
            )));
        }
        let mut updated = self.clone();
        updated.status = next;
        updated.version += 1;
        Ok(updated)
    }

    pub fn belongs_to(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
