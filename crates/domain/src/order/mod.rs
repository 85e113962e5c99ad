//! Order aggregate and related types.

mod aggregate;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use status::{OrderStatus, StatusTransition};
pub use value_objects::LineItem;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order already carries a shipping timestamp.
    #[error("order is already shipped")]
    AlreadyShipped,

    /// Completion was requested before the order shipped.
    #[error("order is not shipped yet")]
    NotShipped,

    /// The order already carries a completion timestamp.
    #[error("order is already completed")]
    AlreadyCompleted,

    /// The requested status is not one the order can move to.
    #[error("unknown order status: {0:?}")]
    UnknownStatus(String),
}
