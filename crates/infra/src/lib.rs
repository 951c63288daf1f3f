//! Infrastructure layer: storage, configuration, collaborators and the
//! marketplace services that orchestrate the domain crates.

pub mod cart;
pub mod config;
pub mod error;
pub mod notify;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use cart::{CartStore, InMemoryCartStore};
pub use config::{InventoryConfig, MarketplaceConfig, PromotionConfig, ServerConfig};
pub use error::{ServiceError, ServiceResult};
pub use notify::{NotifyError, OrderConfirmation, OrderNotifier, TracingNotifier};
pub use services::{
    AdjustmentOutcome, BoostDecision, DecrementOutcome, InventoryLedger, ItemAdjustment,
    MarketBus, OrderService, PlacementReceipt, PromotionService,
};
pub use store::{
    BoostRequestPage, InMemoryStore, MarketplaceStore, Pagination, PostgresStore, StoreError,
    StoreResult,
};
