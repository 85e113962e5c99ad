//! Identifier types shared by every crate of the orders service.

mod types;

pub use types::{CustomerId, OrderId};
