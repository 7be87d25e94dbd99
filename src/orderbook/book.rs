use std::fmt;
use tracing::{debug, info};

use crate::orderbook::anomalies::FeedAnomalies;
use crate::orderbook::ladder::{Ladder, LadderDelta};
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{
    BookSnapshot, EntryType, Level2Message, Price, Side, Timestamp,
};

/// Market-observed depth for one symbol on one exchange
#[derive(Debug, Clone)]
pub struct ExchangeOrderBook {
    pub symbol: String,
    pub exchange: String,

    bids: Ladder, // Highest price first
    asks: Ladder, // Lowest price first

    last_update_time: Option<Timestamp>,
}

impl ExchangeOrderBook {
    pub fn new(symbol: &str, exchange: &str, book_depth: usize) -> Self {
        info!(
            "Creating order book for {} on {} with depth {}",
            symbol, exchange, book_depth
        );

        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            bids: Ladder::new(Side::Buy, book_depth),
            asks: Ladder::new(Side::Sell, book_depth),
            last_update_time: None,
        }
    }

    /// Apply one refresh entry and return the ladder's net change
    pub fn update(&mut self, msg: &Level2Message) -> Option<LadderDelta> {
        self.last_update_time = Some(msg.time);

        match msg.entry_type.side() {
            Some(side) => {
                let delta = self.ladder_mut(side).update(msg);
                debug!(
                    "{} {:?} {:?} {}@{} -> {:?}",
                    self.symbol, msg.entry_type, msg.update_action, msg.quantity, msg.price, delta
                );
                delta
            }
            None => None,
        }
    }

    /// Aggressor of a trade print, taken from the message when the
    /// exchange reports it, otherwise inferred from where it printed.
    pub fn infer_aggressor(&self, msg: &Level2Message) -> Option<Side> {
        if msg.entry_type != EntryType::Trade {
            return None;
        }
        if msg.aggressor_side.is_some() {
            return msg.aggressor_side;
        }

        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), _) if msg.price >= ask => Some(Side::Buy),
            (_, Some(bid)) if msg.price <= bid => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn ladder(&self, side: Side) -> &Ladder {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn ladder_mut(&mut self, side: Side) -> &mut Ladder {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub fn bids(&self) -> &Ladder {
        &self.bids
    }

    pub fn asks(&self) -> &Ladder {
        &self.asks
    }

    pub fn best_bid_price(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask_price(&self) -> Option<Price> {
        self.asks.best_price()
    }

    pub fn level_at(&self, side: Side, price: Price) -> Option<&PriceLevel> {
        self.ladder(side).get(price)
    }

    pub fn last_update_time(&self) -> Option<Timestamp> {
        self.last_update_time
    }

    pub fn spread(&self) -> Option<Price> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    pub fn midpoint(&self) -> Option<f64> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) => Some((ask + bid) as f64 / 2.0),
            _ => None,
        }
    }

    pub fn anomalies(&self) -> FeedAnomalies {
        self.bids.anomalies().merge(self.asks.anomalies())
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            timestamp: self.last_update_time,
            bids: self.bids.iter().map(PriceLevel::info).collect(),
            asks: self.asks.iter().map(PriceLevel::info).collect(),
        }
    }
}

impl fmt::Display for ExchangeOrderBook {
    /// Two columns, bids left and asks right, best prices on the first row
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bids: Vec<String> = self
            .bids
            .iter()
            .map(|l| format!("{}({})", l.price, l.quantity))
            .collect();
        let asks: Vec<String> = self
            .asks
            .iter()
            .map(|l| format!("{}({})", l.price, l.quantity))
            .collect();
        let width = bids.iter().map(String::len).max().unwrap_or(0);

        for row in 0..bids.len().max(asks.len()) {
            let bid = bids.get(row).map(String::as_str).unwrap_or("");
            match asks.get(row) {
                Some(ask) => writeln!(f, "{:<width$} | {}", bid, ask, width = width)?,
                None => writeln!(f, "{:<width$} |", bid, width = width)?,
            }
        }

        Ok(())
    }
}
