//! Orders domain module.
//!
//! Business rules for placing orders and moving them through fulfillment,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod address;
pub mod events;
pub mod order;
pub mod payment;
pub mod status;

pub use address::{PhoneNumber, Recipient, ShippingAddress, DEFAULT_CUSTOMER_NAME};
pub use events::{OrderEvent, OrderPlaced, OrderStatusChanged};
pub use order::{CartLine, Order, OrderItem, PlaceOrder};
pub use payment::PaymentMethod;
pub use status::{InventoryStatus, OrderStatus};
