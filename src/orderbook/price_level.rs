use serde::{Deserialize, Serialize};

use crate::orderbook::types::{Price, PriceLevelInfo, Quantity};

/// Aggregate depth the exchange publishes for one price.
/// Individual orders behind it are not visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
}

impl PriceLevel {
    pub fn new(price: Price, quantity: Quantity, order_count: u32) -> Self {
        Self {
            price,
            quantity,
            order_count,
        }
    }

    /// Overwrite the aggregates, returning the signed quantity delta
    pub fn set(&mut self, quantity: Quantity, order_count: u32) -> Quantity {
        let delta = quantity - self.quantity;
        self.quantity = quantity;
        self.order_count = order_count;
        delta
    }

    pub fn info(&self) -> PriceLevelInfo {
        PriceLevelInfo {
            price: self.price,
            quantity: self.quantity,
            order_count: self.order_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_returns_delta() {
        let mut level = PriceLevel::new(100, 40, 3);

        assert_eq!(level.set(25, 2), -15);
        assert_eq!(level.quantity, 25);
        assert_eq!(level.order_count, 2);

        assert_eq!(level.set(30, 3), 5);
    }
}
