//! Value objects for the order domain.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single line of an order.
///
/// The storage layer carries line items verbatim; nothing here is validated
/// beyond what the JSON shape enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItem {
    /// Reference to the purchased product.
    pub item_id: Uuid,

    /// Number of units ordered.
    pub quantity: u32,

    /// Unit price in the smallest currency unit.
    pub price: u64,
}

impl LineItem {
    /// Creates a line item.
    pub fn new(item_id: Uuid, quantity: u32, price: u64) -> Self {
        Self {
            item_id,
            quantity,
            price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_item_wire_format() {
        let item_id = Uuid::nil();
        let json = serde_json::to_value(LineItem::new(item_id, 3, 1250)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "item_id": "00000000-0000-0000-0000-000000000000",
                "quantity": 3,
                "price": 1250
            })
        );
    }
}
