//! Catalog domain module: the shared `Product` row and its promotion ("boost")
//! lifecycle.
//!
//! Pure, deterministic domain logic (no IO, no HTTP, no storage). Stores persist
//! these types; services decide when to call them.

pub mod events;
pub mod featured;
pub mod plan;
pub mod product;
pub mod promotion;
pub mod request;

pub use events::{BoostApproved, BoostRejected, BoostRequested, PromotionEvent};
pub use featured::{BoostCap, count_effectively_boosted, featured_products};
pub use plan::{BoostPlan, BoostPlanChanges};
pub use product::Product;
pub use promotion::{BoostStatus, Promotion};
pub use request::{BoostRequest, BoostRequestStatus};
