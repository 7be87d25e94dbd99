use std::collections::BTreeMap;
use tracing::debug;

use crate::orderbook::anomalies::FeedAnomalies;
use crate::orderbook::ladder::BookPrice;
use crate::orderbook::types::{OrderStatusEvent, Price, Quantity, Side, Timestamp};
use crate::simulation::price_level::{LotHandle, SimOrder, SimPriceLevel};

/// One side of the simulated book: price-ordered FIFO levels
#[derive(Debug, Clone)]
pub struct SimLadder {
    side: Side,
    levels: BTreeMap<BookPrice, SimPriceLevel>,
    // Anomalies of levels that no longer exist
    retired: FeedAnomalies,
}

impl SimLadder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            retired: FeedAnomalies::default(),
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

    fn key(&self, price: Price) -> BookPrice {
        BookPrice::new(price, self.side)
    }

    pub fn level(&self, price: Price) -> Option<&SimPriceLevel> {
        self.levels.get(&self.key(price))
    }

    pub fn level_mut(&mut self, price: Price) -> Option<&mut SimPriceLevel> {
        let key = self.key(price);
        self.levels.get_mut(&key)
    }

    pub fn best(&self) -> Option<&SimPriceLevel> {
        self.levels.values().next()
    }

    pub fn best_price(&self) -> Option<Price> {
        self.best().map(SimPriceLevel::price)
    }

    /// Levels best first
    pub fn iter(&self) -> impl Iterator<Item = &SimPriceLevel> {
        self.levels.values()
    }

    pub fn anomalies(&self) -> FeedAnomalies {
        self.levels
            .values()
            .fold(self.retired, |acc, level| acc.merge(level.anomalies()))
    }

    fn level_entry(&mut self, price: Price) -> &mut SimPriceLevel {
        let key = self.key(price);
        self.levels
            .entry(key)
            .or_insert_with(|| SimPriceLevel::new(price))
    }

    pub fn add(&mut self, order: SimOrder) -> LotHandle {
        self.level_entry(order.price).add(order)
    }

    pub fn insert(&mut self, order: SimOrder) -> LotHandle {
        self.level_entry(order.price).insert(order)
    }

    /// Remove a lot; the level goes away once no trader size is left in it
    pub fn cancel(&mut self, price: Price, handle: LotHandle) -> Option<SimOrder> {
        let level = self.level_mut(price)?;
        let order = level.erase(handle)?;
        if level.sim_quantity() == 0 {
            self.erase_level(price);
        }
        Some(order)
    }

    pub fn erase_level(&mut self, price: Price) -> Option<SimPriceLevel> {
        let key = self.key(price);
        let level = self.levels.remove(&key)?;
        self.retired = self.retired.merge(level.anomalies());
        Some(level)
    }

    pub fn execute_all(&mut self, price: Price, time: Timestamp, events: &mut Vec<OrderStatusEvent>) {
        if let Some(mut level) = self.erase_level(price) {
            level.execute_all(time, events);
        }
    }

    /// Take up to `quantity` from the head of the level for a simulated
    /// aggressor
    pub fn consume(
        &mut self,
        price: Price,
        quantity: Quantity,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) -> Quantity {
        match self.level_mut(price) {
            Some(level) => level.consume(quantity, time, events),
            None => 0,
        }
    }

    pub fn process_change(
        &mut self,
        price: Price,
        delta: Quantity,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) {
        let side = self.side;
        if let Some(level) = self.level_mut(price) {
            level.process_change(side, delta, time, events);
        }
    }

    /// The market level at `price` vanished. When a trade in this cycle
    /// accounts for all of it, the queue traded away, trader lots included.
    pub fn process_delete(
        &mut self,
        price: Price,
        deleted_quantity: Quantity,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) {
        let Some(level) = self.level_mut(price) else {
            return;
        };

        if level.traded_quantity > 0 && level.traded_quantity == deleted_quantity {
            debug!("Level {} deleted after trading out", price);
            self.execute_all(price, time, events);
            return;
        }

        level.clean_all();
        level.traded_quantity = 0;
        if level.sim_quantity() == 0 {
            self.erase_level(price);
        }
    }

    pub fn process_new(&mut self, price: Price, displayed: Quantity) {
        let side = self.side;
        if let Some(level) = self.level_mut(price) {
            level.process_new(side, displayed);
        }
    }

    /// Fully execute every level ranked at or ahead of `limit`
    pub fn execute_through(
        &mut self,
        limit: Price,
        inclusive: bool,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) {
        while let Some(best) = self.best_price() {
            let reached = if inclusive {
                !self.ranks_before(limit, best)
            } else {
                self.ranks_before(best, limit)
            };
            if !reached {
                break;
            }
            self.execute_all(best, time, events);
        }
    }

    /// Forget trade prints once the packet that carried them is applied
    pub fn end_cycle(&mut self) {
        for level in self.levels.values_mut() {
            level.traded_quantity = 0;
        }
    }

    pub fn ranks_before(&self, a: Price, b: Price) -> bool {
        self.key(a) < self.key(b)
    }

    /// Drop levels holding no trader size for which `keep` says no
    pub fn prune(&mut self, keep: impl Fn(Price) -> bool) {
        let stale: Vec<Price> = self
            .levels
            .values()
            .filter(|level| level.sim_quantity() == 0 && !keep(level.price()))
            .map(SimPriceLevel::price)
            .collect();

        for price in stale {
            self.erase_level(price);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::OrderStatus;
    use uuid::Uuid;

    fn now() -> Timestamp {
        Timestamp::default()
    }

    fn trader(side: Side, price: Price, quantity: Quantity) -> SimOrder {
        SimOrder::new(Uuid::new_v4(), side, price, quantity)
    }

    #[test]
    fn test_levels_ordered_by_side() {
        let mut asks = SimLadder::new(Side::Sell);
        asks.add(trader(Side::Sell, 103, 1));
        asks.add(trader(Side::Sell, 101, 1));

        let mut bids = SimLadder::new(Side::Buy);
        bids.add(trader(Side::Buy, 98, 1));
        bids.add(trader(Side::Buy, 99, 1));

        assert_eq!(asks.best_price(), Some(101));
        assert_eq!(bids.best_price(), Some(99));
    }

    #[test]
    fn test_cancel_drops_level_without_trader_size() {
        let mut bids = SimLadder::new(Side::Buy);
        bids.insert(SimOrder::opaque(Side::Buy, 100, 40));
        let handle = bids.add(trader(Side::Buy, 100, 10));

        assert!(bids.cancel(100, handle).is_some());
        assert!(bids.level(100).is_none());
        assert!(bids.cancel(100, handle).is_none());
    }

    #[test]
    fn test_delete_after_full_trade_executes() {
        let mut asks = SimLadder::new(Side::Sell);
        asks.insert(SimOrder::opaque(Side::Sell, 101, 30));
        asks.add(trader(Side::Sell, 101, 5));
        asks.level_mut(101).unwrap().traded_quantity = 30;

        let mut events = Vec::new();
        asks.process_delete(101, 30, now(), &mut events);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, OrderStatus::Filled);
        assert!(asks.level(101).is_none());
    }

    #[test]
    fn test_delete_without_trade_keeps_trader_lots() {
        let mut asks = SimLadder::new(Side::Sell);
        asks.insert(SimOrder::opaque(Side::Sell, 101, 30));
        asks.add(trader(Side::Sell, 101, 5));

        let mut events = Vec::new();
        asks.process_delete(101, 30, now(), &mut events);

        assert!(events.is_empty());
        let level = asks.level(101).unwrap();
        assert_eq!(level.quantity(), 5);
        assert_eq!(level.sim_quantity(), 5);
    }

    #[test]
    fn test_execute_through_inclusive_and_strict() {
        let mut bids = SimLadder::new(Side::Buy);
        for price in [100, 99, 98] {
            bids.add(trader(Side::Buy, price, 1));
        }

        let mut events = Vec::new();
        bids.execute_through(100, false, now(), &mut events);
        assert!(events.is_empty());

        bids.execute_through(99, true, now(), &mut events);
        assert_eq!(events.len(), 2);
        assert_eq!(bids.best_price(), Some(98));
    }

    #[test]
    fn test_end_cycle_clears_traded_quantity() {
        let mut asks = SimLadder::new(Side::Sell);
        asks.insert(SimOrder::opaque(Side::Sell, 101, 30));
        asks.insert(SimOrder::opaque(Side::Sell, 102, 30));
        asks.level_mut(101).unwrap().traded_quantity = 12;
        asks.level_mut(102).unwrap().traded_quantity = 4;

        asks.end_cycle();

        assert!(asks.iter().all(|level| level.traded_quantity == 0));
    }

    #[test]
    fn test_prune_keeps_trader_levels() {
        let mut bids = SimLadder::new(Side::Buy);
        bids.insert(SimOrder::opaque(Side::Buy, 100, 40));
        bids.add(trader(Side::Buy, 99, 5));
        bids.insert(SimOrder::opaque(Side::Buy, 98, 10));

        bids.prune(|price| price == 98);

        assert!(bids.level(100).is_none());
        assert!(bids.level(99).is_some());
        assert!(bids.level(98).is_some());
    }
}
