//! Inventory domain module.
//!
//! Pure stock arithmetic and the facts published when stock changes. The
//! race-safe read/compare-and-swap loop around it lives in the infra ledger.

pub mod events;
pub mod stock;

pub use events::{InventoryEvent, StockDecremented, StockSet};
pub use stock::{DEFAULT_LOW_STOCK_THRESHOLD, LowStockPolicy, StockDecrement, validate_stock_level};
