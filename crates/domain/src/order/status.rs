//! Order lifecycle status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Where an order is in its lifecycle.
///
/// Derived from the order's timestamps rather than stored:
/// ```text
/// Pending ──ship──► Shipped ──complete──► Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, not shipped yet.
    #[default]
    Pending,

    /// Shipped, awaiting completion.
    Shipped,

    /// Completed (terminal state).
    Completed,
}

impl OrderStatus {
    /// Returns true if the order can be shipped in this status.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be completed in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status change requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusTransition {
    /// Stamp `shipped_at`.
    Ship,

    /// Stamp `completed_at`.
    Complete,
}

impl StatusTransition {
    /// The status an order ends up in after this transition.
    pub fn target(&self) -> OrderStatus {
        match self {
            StatusTransition::Ship => OrderStatus::Shipped,
            StatusTransition::Complete => OrderStatus::Completed,
        }
    }
}

impl FromStr for StatusTransition {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shipped" => Ok(StatusTransition::Ship),
            "completed" => Ok(StatusTransition::Complete),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn only_pending_can_ship() {
        assert!(OrderStatus::Pending.can_ship());
        assert!(!OrderStatus::Shipped.can_ship());
        assert!(!OrderStatus::Completed.can_ship());
    }

    #[test]
    fn only_shipped_can_complete() {
        assert!(!OrderStatus::Pending.can_complete());
        assert!(OrderStatus::Shipped.can_complete());
        assert!(!OrderStatus::Completed.can_complete());
    }

    #[test]
    fn parses_transition_names() {
        assert_eq!(
            "shipped".parse::<StatusTransition>(),
            Ok(StatusTransition::Ship)
        );
        assert_eq!(
            "completed".parse::<StatusTransition>(),
            Ok(StatusTransition::Complete)
        );
        assert_eq!(
            "cancelled".parse::<StatusTransition>(),
            Err(OrderError::UnknownStatus("cancelled".to_string()))
        );
        // Names are case sensitive.
        assert!("Shipped".parse::<StatusTransition>().is_err());
    }

    #[test]
    fn transition_targets() {
        assert_eq!(StatusTransition::Ship.target(), OrderStatus::Shipped);
        assert_eq!(StatusTransition::Complete.target(), OrderStatus::Completed);
    }

    #[test]
    fn display() {
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert_eq!(OrderStatus::Shipped.to_string(), "shipped");
        assert_eq!(OrderStatus::Completed.to_string(), "completed");
    }
}
