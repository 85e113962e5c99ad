//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use serde::{Deserialize, Serialize};

use super::{LineItem, OrderError, OrderStatus, StatusTransition};

/// Order aggregate root.
///
/// An order is persisted as one serialized unit together with its line
/// items. The lifecycle only moves forward: `shipped_at` is stamped once,
/// and `completed_at` is stamped once and only after `shipped_at`.
/// Decoding a record that breaks this rule fails instead of producing an
/// order in an impossible state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord")]
pub struct Order {
    order_id: OrderId,
    customer_id: CustomerId,
    line_items: Vec<LineItem>,
    created_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Unchecked wire shape of an order.
#[derive(Deserialize)]
struct OrderRecord {
    order_id: OrderId,
    customer_id: CustomerId,
    #[serde(default)]
    line_items: Vec<LineItem>,
    created_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        if record.completed_at.is_some() && record.shipped_at.is_none() {
            return Err(OrderError::NotShipped);
        }

        Ok(Self {
            order_id: record.order_id,
            customer_id: record.customer_id,
            line_items: record.line_items,
            created_at: record.created_at,
            shipped_at: record.shipped_at,
            completed_at: record.completed_at,
        })
    }
}

impl Order {
    /// Creates a pending order with a caller-assigned id and creation time.
    pub fn new(
        order_id: OrderId,
        customer_id: CustomerId,
        line_items: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            customer_id,
            line_items,
            created_at,
            shipped_at: None,
            completed_at: None,
        }
    }

    /// Places a new order: draws a random id and stamps the current UTC time.
    pub fn place(customer_id: CustomerId, line_items: Vec<LineItem>) -> Self {
        Self::new(OrderId::random(), customer_id, line_items, Utc::now())
    }
}

// Query methods
impl Order {
    /// Returns the order id.
    pub fn id(&self) -> OrderId {
        self.order_id
    }

    /// Returns the customer who placed the order.
    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Returns the line items in the order they were submitted.
    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// Returns when the order was placed.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the order shipped, if it has.
    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    /// Returns when the order completed, if it has.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the lifecycle status derived from the timestamps.
    pub fn status(&self) -> OrderStatus {
        match (self.shipped_at, self.completed_at) {
            (_, Some(_)) => OrderStatus::Completed,
            (Some(_), None) => OrderStatus::Shipped,
            (None, None) => OrderStatus::Pending,
        }
    }
}

// Transitions
impl Order {
    /// Marks the order as shipped at `at`.
    pub fn ship(&mut self, at: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status().can_ship() {
            return Err(OrderError::AlreadyShipped);
        }
        self.shipped_at = Some(at);
        Ok(())
    }

    /// Marks the order as completed at `at`.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), OrderError> {
        match self.status() {
            OrderStatus::Completed => return Err(OrderError::AlreadyCompleted),
            status if !status.can_complete() => return Err(OrderError::NotShipped),
            _ => {}
        }
        self.completed_at = Some(at);
        Ok(())
    }

    /// Applies a requested transition at `at`.
    ///
    /// On error the order is left untouched.
    pub fn apply(
        &mut self,
        transition: StatusTransition,
        at: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        match transition {
            StatusTransition::Ship => self.ship(at),
            StatusTransition::Complete => self.complete(at),
        }
    }
}
