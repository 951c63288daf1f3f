//! Marketplace services: the orchestration layer between HTTP handlers and the
//! store.
//!
//! Every service follows the same pipeline:
//!
//! ```text
//! authorize → load → decide (pure domain call) → one atomic store call → publish
//! ```
//!
//! Services are generic over the event bus `B` and hold the store as a trait
//! object, so tests run against `InMemoryStore` and production against
//! `PostgresStore` without code changes.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use kudimall_events::{EventEnvelope, InMemoryEventBus};

pub mod ledger;
pub mod orders;
pub mod promotion;

pub use ledger::{DecrementOutcome, InventoryLedger};
pub use orders::{AdjustmentOutcome, ItemAdjustment, OrderService, PlacementReceipt};
pub use promotion::{BoostDecision, PromotionService};

/// The bus the marketplace services publish to in this process.
pub type MarketBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

pub(crate) const PRODUCT_AGGREGATE: &str = "catalog.product";
pub(crate) const ORDER_AGGREGATE: &str = "sales.order";
