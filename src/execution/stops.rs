use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::orderbook::types::{OrderId, Price, Side, StopOrder};

/// Resting stop orders of one symbol, kept in trigger order:
/// buy stops lowest trigger first, sell stops highest trigger first.
#[derive(Debug, Clone, Default)]
pub struct StopBook {
    buys: BTreeMap<(Price, u64), StopOrder>,
    sells: BTreeMap<(Reverse<Price>, u64), StopOrder>,
    next_seq: u64,
}

/// Fill price for a stop at `trigger` given the current top of book,
/// `None` while it should keep resting
pub fn trigger_price(
    side: Side,
    trigger: Price,
    best_bid: Option<Price>,
    best_ask: Option<Price>,
) -> Option<Price> {
    match side {
        Side::Buy => best_ask.filter(|&ask| ask >= trigger),
        Side::Sell => best_bid.filter(|&bid| bid <= trigger),
    }
}

impl StopBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    pub fn add(&mut self, order: StopOrder) {
        let seq = self.next_seq;
        self.next_seq += 1;

        match order.side {
            Side::Buy => {
                self.buys.insert((order.stop_price, seq), order);
            }
            Side::Sell => {
                self.sells.insert((Reverse(order.stop_price), seq), order);
            }
        }
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.buys.values().chain(self.sells.values()).any(|o| o.id == id)
    }

    /// Remove one stop by id, leaving others at the same trigger alone
    pub fn remove(&mut self, id: OrderId) -> Option<StopOrder> {
        if let Some(key) = self.buys.iter().find(|(_, o)| o.id == id).map(|(k, _)| *k) {
            return self.buys.remove(&key);
        }
        let key = self.sells.iter().find(|(_, o)| o.id == id).map(|(k, _)| *k)?;
        self.sells.remove(&key)
    }

    /// Take every stop the top of book has reached, in trigger order,
    /// paired with its fill price
    pub fn take_triggered(
        &mut self,
        best_bid: Option<Price>,
        best_ask: Option<Price>,
    ) -> Vec<(StopOrder, Price)> {
        let mut triggered = Vec::new();

        while let Some(entry) = self.buys.first_entry() {
            match trigger_price(Side::Buy, entry.key().0, best_bid, best_ask) {
                Some(price) => triggered.push((entry.remove(), price)),
                None => break,
            }
        }

        while let Some(entry) = self.sells.first_entry() {
            match trigger_price(Side::Sell, entry.key().0 .0, best_bid, best_ask) {
                Some(price) => triggered.push((entry.remove(), price)),
                None => break,
            }
        }

        triggered
    }
}
