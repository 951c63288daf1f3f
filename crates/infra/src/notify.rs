//! Order confirmation dispatch.
//!
//! Notifications are best-effort: the order service spawns them after the
//! order commits and only logs failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use kudimall_core::{Money, OrderId};
use kudimall_sales::PhoneNumber;

/// Payload of an order confirmation (SMS/WhatsApp in production).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub customer_name: String,
    /// Always E.164.
    pub customer_phone: PhoneNumber,
    pub total_amount: Money,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify_order_confirmed(&self, confirmation: OrderConfirmation)
    -> Result<(), NotifyError>;
}

/// Notifier that only writes the confirmation to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl OrderNotifier for TracingNotifier {
    async fn notify_order_confirmed(
        &self,
        confirmation: OrderConfirmation,
    ) -> Result<(), NotifyError> {
        info!(
            order_id = %confirmation.order_id,
            customer_name = %confirmation.customer_name,
            customer_phone = %confirmation.customer_phone,
            total_pesewas = confirmation.total_amount.minor_units(),
            "order confirmation sent"
        );
        Ok(())
    }
}
