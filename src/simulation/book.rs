use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::orderbook::anomalies::FeedAnomalies;
use crate::orderbook::error::{EngineError, EngineResult};
use crate::orderbook::ladder::{BookPrice, Ladder, LadderDelta};
use crate::orderbook::types::{
    OrderId, OrderStatus, OrderStatusEvent, Price, Quantity, Side, Timestamp, OPAQUE_ORDER_ID,
};
use crate::simulation::ladder::SimLadder;
use crate::simulation::price_level::{LotHandle, SimOrder};

/// Where a trader lot rests in the simulated book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLocation {
    pub side: Side,
    pub price: Price,
    pub handle: LotHandle,
}

/// Both sides of the simulated book plus the id index of resting trader lots
#[derive(Debug, Clone)]
pub struct SimBook {
    bids: SimLadder,
    asks: SimLadder,
    orders: HashMap<OrderId, OrderLocation>,
}

impl Default for SimBook {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBook {
    pub fn new() -> Self {
        Self {
            bids: SimLadder::new(Side::Buy),
            asks: SimLadder::new(Side::Sell),
            orders: HashMap::new(),
        }
    }

    pub fn ladder(&self, side: Side) -> &SimLadder {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn ladder_mut(&mut self, side: Side) -> &mut SimLadder {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub fn bids(&self) -> &SimLadder {
        &self.bids
    }

    pub fn asks(&self) -> &SimLadder {
        &self.asks
    }

    pub fn best_bid_price(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask_price(&self) -> Option<Price> {
        self.asks.best_price()
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    /// Number of resting trader orders
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn anomalies(&self) -> FeedAnomalies {
        self.bids.anomalies().merge(&self.asks.anomalies())
    }

    /// Rest at the tail of the level
    pub fn add(&mut self, order: SimOrder) -> LotHandle {
        let (id, side, price) = (order.id, order.side, order.price);
        let handle = self.ladder_mut(side).add(order);
        self.index(id, side, price, handle);
        handle
    }

    /// Rest at the head of the level
    pub fn insert(&mut self, order: SimOrder) -> LotHandle {
        let (id, side, price) = (order.id, order.side, order.price);
        let handle = self.ladder_mut(side).insert(order);
        self.index(id, side, price, handle);
        handle
    }

    fn index(&mut self, id: OrderId, side: Side, price: Price, handle: LotHandle) {
        if id != OPAQUE_ORDER_ID {
            self.orders.insert(
                id,
                OrderLocation {
                    side,
                    price,
                    handle,
                },
            );
        }
    }

    /// Drop filled trader lots from the index
    fn settle(&mut self, events: &[OrderStatusEvent]) {
        for event in events {
            if event.status == OrderStatus::Filled {
                self.orders.remove(&event.order_id);
            }
        }
    }

    pub fn cancel(
        &mut self,
        id: OrderId,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) -> EngineResult<SimOrder> {
        let location = self.orders.remove(&id).ok_or_else(|| {
            warn!("Cancel for unknown order {}", id);
            EngineError::OrderNotFound(id)
        })?;

        let order = self
            .ladder_mut(location.side)
            .cancel(location.price, location.handle)
            .ok_or(EngineError::OrderNotFound(id))?;

        debug!("Canceled {} {}@{}", id, order.quantity, order.price);
        events.push(OrderStatusEvent::cancelled(id, time, "Canceled by trader"));
        Ok(order)
    }

    /// Walk the opposite side for an incoming order at `limit`, consuming
    /// queued size best price first. Levels present only in the market view
    /// are seeded from their displayed size before being consumed.
    /// Returns the quantity left unexecuted.
    #[allow(clippy::too_many_arguments)]
    pub fn cross(
        &mut self,
        id: OrderId,
        side: Side,
        limit: Price,
        quantity: Quantity,
        market: &Ladder,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) -> Quantity {
        let opposite = side.opposite();
        let crossing = |price: &Price| side.crosses(limit, *price);

        let prices: BTreeSet<BookPrice> = market
            .iter()
            .map(|level| level.price)
            .chain(self.ladder(opposite).iter().map(|level| level.price()))
            .filter(crossing)
            .map(|price| BookPrice::new(price, opposite))
            .collect();

        let start = events.len();
        let mut remaining = quantity;
        let mut levels = 0;

        for key in prices {
            if remaining == 0 {
                break;
            }
            let price = key.value;
            let ladder = self.ladder_mut(opposite);

            let seeded = ladder.level(price).map_or(false, |level| level.is_defined());
            if !seeded {
                if let Some(displayed) = market.get(price).map(|level| level.quantity) {
                    if displayed > 0 {
                        ladder.insert(SimOrder::opaque(opposite, price, displayed));
                    }
                }
            }

            // Resting lots hit at this price report first, then the aggressor
            let consumed = ladder.consume(price, remaining, time, events);
            if consumed > 0 {
                remaining -= consumed;
                levels += 1;
                events.push(if remaining == 0 {
                    OrderStatusEvent::filled(id, time, price, consumed)
                } else {
                    OrderStatusEvent::partially_filled(id, time, price, consumed)
                });
            }
        }

        if levels > 0 {
            debug!(
                "{} {} {}@{} crossed {} levels, {} left",
                id, side, quantity, limit, levels, remaining
            );
        }

        self.settle(&events[start..]);
        remaining
    }

    /// Execute resting levels the market has moved through: asks at or
    /// below the market best bid and bids at or above the market best ask.
    pub fn execute_crosses(
        &mut self,
        market_best_bid: Option<Price>,
        market_best_ask: Option<Price>,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) {
        let start = events.len();

        if let Some(bid) = market_best_bid {
            self.asks.execute_through(bid, true, time, events);
        }
        if let Some(ask) = market_best_ask {
            self.bids.execute_through(ask, true, time, events);
        }

        self.settle(&events[start..]);
    }

    /// A trade printed at `price`: levels strictly through it traded out,
    /// and the level sitting exactly at it records the traded size. With a
    /// known aggressor only the resting side it hit records the size.
    pub fn process_trade(
        &mut self,
        price: Price,
        quantity: Quantity,
        aggressor: Option<Side>,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) {
        let start = events.len();

        self.bids.execute_through(price, false, time, events);
        self.asks.execute_through(price, false, time, events);

        for ladder in [&mut self.bids, &mut self.asks] {
            let hit = aggressor.map_or(true, |side| side.opposite() == ladder.side());
            if hit && ladder.best_price() == Some(price) {
                if let Some(level) = ladder.level_mut(price) {
                    level.traded_quantity += quantity;
                }
            }
        }

        self.settle(&events[start..]);
    }

    /// Reconcile one market ladder change on `side`
    pub fn apply_delta(
        &mut self,
        side: Side,
        delta: LadderDelta,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) {
        let start = events.len();
        let ladder = self.ladder_mut(side);

        match delta {
            LadderDelta::Inserted { price, quantity } => ladder.process_new(price, quantity),
            LadderDelta::Changed { price, .. } => {
                ladder.process_change(price, delta.quantity_delta(), time, events)
            }
            LadderDelta::Deleted { price, quantity } => {
                ladder.process_delete(price, quantity, time, events)
            }
        }

        self.settle(&events[start..]);
    }

    pub fn end_cycle(&mut self) {
        self.bids.end_cycle();
        self.asks.end_cycle();
    }

    /// Forget depleted levels the market no longer shows
    pub fn prune(&mut self, market_bids: &Ladder, market_asks: &Ladder) {
        self.bids.prune(|price| market_bids.contains(price));
        self.asks.prune(|price| market_asks.contains(price));
    }
}
