//! One side of the market-observed depth, rebuilt from level-2 deltas.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::orderbook::anomalies::FeedAnomalies;
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{EntryType, Level2Message, Price, Quantity, Side, UpdateAction};

/// Price key whose ordering depends on the book side:
/// bids rank highest price first, asks lowest price first.
#[derive(Debug, Clone, Copy, Eq)]
pub struct BookPrice {
    pub value: Price,
    pub side: Side,
}

impl BookPrice {
    pub fn new(value: Price, side: Side) -> Self {
        Self { value, side }
    }
}

impl PartialEq for BookPrice {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for BookPrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BookPrice {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.side {
            Side::Buy => other.value.cmp(&self.value),
            Side::Sell => self.value.cmp(&other.value),
        }
    }
}

/// Net effect of one refresh entry on a ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LadderDelta {
    Inserted {
        price: Price,
        quantity: Quantity,
    },
    Changed {
        price: Price,
        old_quantity: Quantity,
        new_quantity: Quantity,
    },
    Deleted {
        price: Price,
        quantity: Quantity,
    },
}

impl LadderDelta {
    pub fn price(&self) -> Price {
        match *self {
            LadderDelta::Inserted { price, .. }
            | LadderDelta::Changed { price, .. }
            | LadderDelta::Deleted { price, .. } => price,
        }
    }

    /// Signed change of the displayed quantity at the price
    pub fn quantity_delta(&self) -> Quantity {
        match *self {
            LadderDelta::Inserted { quantity, .. } => quantity,
            LadderDelta::Changed {
                old_quantity,
                new_quantity,
                ..
            } => new_quantity - old_quantity,
            LadderDelta::Deleted { quantity, .. } => -quantity,
        }
    }
}

/// Bounded, side-ordered map of price to aggregate depth
#[derive(Debug, Clone)]
pub struct Ladder {
    side: Side,
    max_levels: usize,
    levels: BTreeMap<BookPrice, PriceLevel>,
    anomalies: FeedAnomalies,
}

impl Ladder {
    pub fn new(side: Side, max_levels: usize) -> Self {
        Self {
            side,
            max_levels,
            levels: BTreeMap::new(),
            anomalies: FeedAnomalies::default(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn anomalies(&self) -> &FeedAnomalies {
        &self.anomalies
    }

    /// Apply a refresh entry; trade prints never touch the ladder
    pub fn update(&mut self, msg: &Level2Message) -> Option<LadderDelta> {
        if msg.entry_type == EntryType::Trade {
            return None;
        }

        self.apply(msg.update_action, msg.price, msg.quantity, msg.order_count)
    }

    pub fn apply(
        &mut self,
        action: UpdateAction,
        price: Price,
        quantity: Quantity,
        order_count: u32,
    ) -> Option<LadderDelta> {
        match action {
            UpdateAction::New => self.insert_level(price, quantity, order_count),
            UpdateAction::Change => self.change_level(price, quantity, order_count),
            UpdateAction::Delete => self.delete_level(price),
        }
    }

    fn insert_level(
        &mut self,
        price: Price,
        quantity: Quantity,
        order_count: u32,
    ) -> Option<LadderDelta> {
        let key = BookPrice::new(price, self.side);

        if let Some(level) = self.levels.get_mut(&key) {
            self.anomalies.record_duplicate_insert(price);
            let old_quantity = level.quantity;
            level.set(quantity, order_count);
            return Some(LadderDelta::Changed {
                price,
                old_quantity,
                new_quantity: quantity,
            });
        }

        self.levels
            .insert(key, PriceLevel::new(price, quantity, order_count));

        if self.levels.len() > self.max_levels {
            if let Some((evicted, _)) = self.levels.pop_last() {
                debug!(
                    "{} ladder over depth {}, evicted level {}",
                    self.side, self.max_levels, evicted.value
                );
                if evicted.value == price {
                    return None;
                }
            }
        }

        Some(LadderDelta::Inserted { price, quantity })
    }

    fn change_level(
        &mut self,
        price: Price,
        quantity: Quantity,
        order_count: u32,
    ) -> Option<LadderDelta> {
        match self.levels.get_mut(&BookPrice::new(price, self.side)) {
            Some(level) => {
                let old_quantity = level.quantity;
                level.set(quantity, order_count);
                Some(LadderDelta::Changed {
                    price,
                    old_quantity,
                    new_quantity: quantity,
                })
            }
            None => {
                self.anomalies.record_unknown_change(price);
                self.insert_level(price, quantity, order_count)
            }
        }
    }

    fn delete_level(&mut self, price: Price) -> Option<LadderDelta> {
        match self.levels.remove(&BookPrice::new(price, self.side)) {
            Some(level) => Some(LadderDelta::Deleted {
                price,
                quantity: level.quantity,
            }),
            None => {
                self.anomalies.record_unknown_delete(price);
                None
            }
        }
    }

    pub fn get(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&BookPrice::new(price, self.side))
    }

    pub fn contains(&self, price: Price) -> bool {
        self.levels.contains_key(&BookPrice::new(price, self.side))
    }

    pub fn best(&self) -> Option<&PriceLevel> {
        self.levels.values().next()
    }

    pub fn worst(&self) -> Option<&PriceLevel> {
        self.levels.values().next_back()
    }

    pub fn best_price(&self) -> Option<Price> {
        self.best().map(|level| level.price)
    }

    /// Levels best first
    pub fn iter(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values()
    }

    /// True when `a` ranks strictly ahead of `b` on this side
    pub fn ranks_before(&self, a: Price, b: Price) -> bool {
        BookPrice::new(a, self.side) < BookPrice::new(b, self.side)
    }

    /// True when `price` falls inside the depth window the feed reports,
    /// so an absent level there really has no resting size.
    pub fn is_visible(&self, price: Price) -> bool {
        if self.levels.len() < self.max_levels {
            return true;
        }

        match self.worst() {
            Some(worst) => !self.ranks_before(worst.price, price),
            None => true,
        }
    }
}
