//! Marketplace domain events and the pub/sub mechanics that carry them.
//!
//! Events are published **after** the store commits the change they describe.
//! Publication is best-effort: consumers (low-stock alerts, audit feeds) must
//! tolerate gaps and duplicates.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription, publish_best_effort};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
