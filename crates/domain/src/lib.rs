//! Domain layer for the orders service.
//!
//! This crate owns the order aggregate as it is persisted:
//! - `Order` with its line items and lifecycle timestamps
//! - `StatusTransition` for the "shipped" and "completed" updates
//! - `OrderError` for transitions the lifecycle does not allow

pub mod order;

pub use common::{CustomerId, OrderId};
pub use order::{LineItem, Order, OrderError, OrderStatus, StatusTransition};
