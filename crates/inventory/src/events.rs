use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kudimall_core::{OrderId, ProductId};
use kudimall_events::Event;

/// Event: StockDecremented (a sale consumed stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecremented {
    pub product_id: ProductId,
    pub order_id: Option<OrderId>,
    pub previous: i64,
    pub requested: i64,
    pub new_stock: i64,
    /// Units sold beyond available stock (clamp-to-zero policy).
    pub shortfall: i64,
    pub low_stock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockSet (vendor overwrote the stock level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSet {
    pub product_id: ProductId,
    pub previous: i64,
    pub new_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockDecremented(StockDecremented),
    StockSet(StockSet),
}

impl InventoryEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::StockDecremented(e) => e.product_id,
            InventoryEvent::StockSet(e) => e.product_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockDecremented(_) => "inventory.stock_decremented",
            InventoryEvent::StockSet(_) => "inventory.stock_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockDecremented(e) => e.occurred_at,
            InventoryEvent::StockSet(e) => e.occurred_at,
        }
    }
}
