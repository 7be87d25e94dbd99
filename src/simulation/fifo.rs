use tracing::{debug, info};

use crate::orderbook::anomalies::FeedAnomalies;
use crate::orderbook::book::ExchangeOrderBook;
use crate::orderbook::error::EngineResult;
use crate::orderbook::ladder::LadderDelta;
use crate::orderbook::types::{
    LimitOrder, Level2Message, OrderId, OrderStatusEvent, Price, Quantity, Timestamp,
};
use crate::simulation::book::SimBook;
use crate::simulation::price_level::{LotHandle, SimOrder};

/// Market-observed book and simulated book for one (symbol, exchange).
///
/// Every inbound level-2 entry first updates the market view, then the
/// resulting ladder delta is replayed against the simulated queues so that
/// trader orders fill the way their queue position says they would.
#[derive(Debug, Clone)]
pub struct FifoMatchingEngine {
    book: ExchangeOrderBook,
    sim: SimBook,
}

impl FifoMatchingEngine {
    pub fn new(symbol: &str, exchange: &str, book_depth: usize) -> Self {
        info!("Creating matching engine for {} on {}", symbol, exchange);

        Self {
            book: ExchangeOrderBook::new(symbol, exchange, book_depth),
            sim: SimBook::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.book.symbol
    }

    pub fn exchange(&self) -> &str {
        &self.book.exchange
    }

    /// Market-observed depth
    pub fn order_book(&self) -> &ExchangeOrderBook {
        &self.book
    }

    pub fn sim_book(&self) -> &SimBook {
        &self.sim
    }

    pub fn best_bid_price(&self) -> Option<Price> {
        self.book.best_bid_price()
    }

    pub fn best_ask_price(&self) -> Option<Price> {
        self.book.best_ask_price()
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.sim.contains(id)
    }

    /// Feed inconsistencies seen by both books
    pub fn anomalies(&self) -> FeedAnomalies {
        self.book.anomalies().merge(&self.sim.anomalies())
    }

    /// Submit a limit order: cross what it can, rest the remainder.
    /// Returns the quantity left resting.
    pub fn send_order(
        &mut self,
        order: &LimitOrder,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) -> Quantity {
        let opposite = self.book.ladder(order.side.opposite());
        let remaining = self.sim.cross(
            order.id,
            order.side,
            order.price,
            order.quantity,
            opposite,
            time,
            events,
        );

        if remaining > 0 {
            let mut lot = SimOrder::new(order.id, order.side, order.price, remaining);
            lot.time_in_force = order.time_in_force;
            self.rest(lot);
        }

        remaining
    }

    /// Queue placement for a trader lot that does not cross
    fn rest(&mut self, order: SimOrder) -> LotHandle {
        let (side, price) = (order.side, order.price);
        let (known, defined) = match self.sim.ladder(side).level(price) {
            Some(level) => (true, level.is_defined()),
            None => (false, false),
        };

        if defined {
            return self.sim.add(order);
        }

        if let Some(market_level) = self.book.level_at(side, price) {
            // Displayed size was there first
            let displayed = market_level.quantity;
            debug!("Seeding {} {} with {} ahead", side, price, displayed);
            self.sim.insert(SimOrder::opaque(side, price, displayed));
            return self.sim.add(order);
        }

        if !known && self.book.ladder(side).is_visible(price) {
            return self.sim.insert(order);
        }

        self.sim.add(order)
    }

    pub fn cancel_order(
        &mut self,
        id: OrderId,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) -> EngineResult<()> {
        self.sim.cancel(id, time, events).map(|_| ())
    }

    /// Close an update cycle: trade prints of this packet no longer
    /// explain shrinks in the next one
    pub fn end_cycle(&mut self) {
        self.sim.end_cycle();
    }

    /// Run one level-2 entry through both books
    pub fn update(
        &mut self,
        msg: &Level2Message,
        events: &mut Vec<OrderStatusEvent>,
    ) -> Option<LadderDelta> {
        let delta = self.book.update(msg);

        self.sim.execute_crosses(
            self.book.best_bid_price(),
            self.book.best_ask_price(),
            msg.time,
            events,
        );

        match msg.entry_type.side() {
            Some(side) => {
                if let Some(delta) = delta {
                    self.sim.apply_delta(side, delta, msg.time, events);
                }
            }
            None => {
                let aggressor = self.book.infer_aggressor(msg);
                debug!(
                    "{} trade {}@{} aggressor {:?}",
                    self.book.symbol, msg.quantity, msg.price, aggressor
                );
                self.sim
                    .process_trade(msg.price, msg.quantity, aggressor, msg.time, events)
            }
        }

        self.sim.prune(self.book.bids(), self.book.asks());
        delta
    }
}
