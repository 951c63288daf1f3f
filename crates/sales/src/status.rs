use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order lifecycle.
///
/// Delivered, Cancelled and Payment Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    #[serde(rename = "Payment Failed")]
    PaymentFailed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::PaymentFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::PaymentFailed => "Payment Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::PaymentFailed
        )
    }

    /// Statuses a checkout reports when payment did not go through.
    pub fn is_payment_failure(&self) -> bool {
        matches!(self, OrderStatus::PaymentFailed | OrderStatus::Cancelled)
    }

    /// Statuses a checkout may create an order in.
    pub fn is_valid_initial(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Processing
                | OrderStatus::PaymentFailed
                | OrderStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Pending, PaymentFailed)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    // Position along the fulfillment path; terminal states rank highest.
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::PaymentFailed => 3,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status '{s}'"))
    }
}

/// Outcome of the post-placement stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    /// Failed-payment orders never touch stock.
    NotApplicable,
    Adjusted,
    /// At least one item's decrement failed; stock must be corrected by hand.
    NeedsReconciliation,
}

impl InventoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::NotApplicable => "not_applicable",
            InventoryStatus::Adjusted => "adjusted",
            InventoryStatus::NeedsReconciliation => "needs_reconciliation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_applicable" => Some(InventoryStatus::NotApplicable),
            "adjusted" => Some(InventoryStatus::Adjusted),
            "needs_reconciliation" => Some(InventoryStatus::NeedsReconciliation),
            _ => None,
        }
    }
}
