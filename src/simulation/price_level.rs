use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::orderbook::anomalies::FeedAnomalies;
use crate::orderbook::types::{
    OrderId, OrderStatusEvent, Price, Quantity, Side, TimeInForce, Timestamp, OPAQUE_ORDER_ID,
};

/// A lot resting in a simulated queue. Lots with the nil id stand for
/// size owned by other market participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimOrder {
    pub id: OrderId,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub time_in_force: TimeInForce,
}

impl SimOrder {
    pub fn new(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            id,
            side,
            quantity,
            price,
            time_in_force: TimeInForce::Gtc,
        }
    }

    pub fn opaque(side: Side, price: Price, quantity: Quantity) -> Self {
        Self::new(OPAQUE_ORDER_ID, side, price, quantity)
    }

    pub fn is_opaque(&self) -> bool {
        self.id == OPAQUE_ORDER_ID
    }
}

/// Stable key of a lot inside its level queue. Head insertions take
/// decreasing keys and tail insertions increasing ones, so the key order
/// is the queue order and a key stays valid until its lot is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LotHandle(i64);

/// FIFO queue of lots at one price of the simulated book
#[derive(Debug, Clone)]
pub struct SimPriceLevel {
    price: Price,
    queue: BTreeMap<LotHandle, SimOrder>,
    next_front: i64,
    next_back: i64,
    quantity: Quantity,
    sim_quantity: Quantity,
    /// Size printed as traded at this price during the current update cycle
    pub traded_quantity: Quantity,
    // Displayed size already taken by simulated aggressors
    consumed: Quantity,
    is_defined: bool,
    anomalies: FeedAnomalies,
}

impl SimPriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            queue: BTreeMap::new(),
            next_front: -1,
            next_back: 0,
            quantity: 0,
            sim_quantity: 0,
            traded_quantity: 0,
            consumed: 0,
            is_defined: false,
            anomalies: FeedAnomalies::default(),
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    /// Total queued quantity, opaque lots included
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Queued quantity owned by the trader
    pub fn sim_quantity(&self) -> Quantity {
        self.sim_quantity
    }

    pub fn opaque_quantity(&self) -> Quantity {
        self.quantity - self.sim_quantity
    }

    /// Displayed size the market still shows that simulated fills took
    pub fn consumed_quantity(&self) -> Quantity {
        self.consumed
    }

    pub fn is_defined(&self) -> bool {
        self.is_defined
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn anomalies(&self) -> &FeedAnomalies {
        &self.anomalies
    }

    /// Lots in queue order
    pub fn iter(&self) -> impl Iterator<Item = &SimOrder> {
        self.queue.values()
    }

    pub fn get(&self, handle: LotHandle) -> Option<&SimOrder> {
        self.queue.get(&handle)
    }

    /// Append to the tail
    pub fn add(&mut self, order: SimOrder) -> LotHandle {
        let handle = LotHandle(self.next_back);
        self.next_back += 1;
        self.credit(&order);
        self.queue.insert(handle, order);
        handle
    }

    /// Prepend to the head; the level's composition is known from here on
    pub fn insert(&mut self, order: SimOrder) -> LotHandle {
        let handle = LotHandle(self.next_front);
        self.next_front -= 1;
        self.credit(&order);
        self.queue.insert(handle, order);
        self.is_defined = true;
        handle
    }

    pub fn erase(&mut self, handle: LotHandle) -> Option<SimOrder> {
        let order = self.queue.remove(&handle)?;
        self.debit(order.quantity, !order.is_opaque());
        Some(order)
    }

    /// Drop opaque lots from the tail backwards until `excess` is absorbed.
    /// Size already taken by simulated fills absorbs first and trader lots
    /// are skipped. Returns the part that could not be absorbed.
    pub fn clean(&mut self, excess: Quantity) -> Quantity {
        let netted = excess.min(self.consumed).max(0);
        self.consumed -= netted;
        let mut remaining = excess - netted;
        let opaque: Vec<LotHandle> = self
            .queue
            .iter()
            .rev()
            .filter(|(_, lot)| lot.is_opaque())
            .map(|(handle, _)| *handle)
            .collect();

        for handle in opaque {
            if remaining <= 0 {
                break;
            }
            let Some(lot) = self.queue.get_mut(&handle) else {
                continue;
            };

            if lot.quantity > remaining {
                lot.quantity -= remaining;
                self.debit(remaining, false);
                remaining = 0;
            } else {
                let taken = lot.quantity;
                self.queue.remove(&handle);
                self.debit(taken, false);
                remaining -= taken;
            }
        }

        if remaining > 0 {
            self.anomalies.record_unabsorbed_clean(self.price, remaining);
        }
        remaining
    }

    /// Drop every opaque lot, keeping trader lots in their order
    pub fn clean_all(&mut self) {
        self.queue.retain(|_, lot| !lot.is_opaque());
        self.quantity = self.sim_quantity;
        self.consumed = 0;
    }

    /// Fill every trader lot in full and empty the level
    pub fn execute_all(&mut self, time: Timestamp, events: &mut Vec<OrderStatusEvent>) {
        for lot in self.queue.values().filter(|lot| !lot.is_opaque()) {
            events.push(OrderStatusEvent::filled(
                lot.id,
                time,
                self.price,
                lot.quantity,
            ));
        }

        debug!(
            "Level {} executed in full ({} sim of {})",
            self.price, self.sim_quantity, self.quantity
        );
        self.queue.clear();
        self.quantity = 0;
        self.sim_quantity = 0;
        self.consumed = 0;
    }

    /// Consume up to `quantity` from the head. Returns how much was consumed.
    pub fn execute(
        &mut self,
        quantity: Quantity,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) -> Quantity {
        let mut unexecuted = quantity;

        while unexecuted > 0 {
            let Some((&handle, lot)) = self.queue.iter_mut().next() else {
                break;
            };
            let id = lot.id;
            let is_sim = !lot.is_opaque();

            if lot.quantity > unexecuted {
                lot.quantity -= unexecuted;
                if is_sim {
                    events.push(OrderStatusEvent::partially_filled(
                        id, time, self.price, unexecuted,
                    ));
                }
                self.debit(unexecuted, is_sim);
                unexecuted = 0;
            } else {
                let filled = lot.quantity;
                self.queue.remove(&handle);
                if is_sim {
                    events.push(OrderStatusEvent::filled(id, time, self.price, filled));
                }
                self.debit(filled, is_sim);
                unexecuted -= filled;
            }
        }

        quantity - unexecuted
    }

    /// Execute on behalf of a simulated aggressor. The market keeps showing
    /// the opaque size taken, so it is remembered for later shrinks.
    pub fn consume(
        &mut self,
        quantity: Quantity,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) -> Quantity {
        let opaque_before = self.opaque_quantity();
        let executed = self.execute(quantity, time, events);
        self.consumed += opaque_before - self.opaque_quantity();
        executed
    }

    /// Reconcile a displayed-size change at this price
    pub fn process_change(
        &mut self,
        side: Side,
        delta: Quantity,
        time: Timestamp,
        events: &mut Vec<OrderStatusEvent>,
    ) {
        if delta > 0 {
            let lot = SimOrder::opaque(side, self.price, delta);
            if self.is_defined {
                self.add(lot);
            } else {
                self.insert(lot);
            }
        } else if delta < 0 {
            if self.traded_quantity == 0 {
                self.clean(-delta);
            } else {
                self.execute(-delta, time, events);
            }
        }

        self.traded_quantity = 0;
    }

    /// Reconcile a level that (re)appeared in the feed with `displayed` size
    pub fn process_new(&mut self, side: Side, displayed: Quantity) {
        if !self.is_defined {
            self.insert(SimOrder::opaque(side, self.price, displayed));
            return;
        }

        let shown = self.opaque_quantity() + self.consumed;
        if displayed > shown {
            self.add(SimOrder::opaque(side, self.price, displayed - shown));
        } else if displayed < shown {
            self.clean(shown - displayed);
        }
    }

    fn credit(&mut self, order: &SimOrder) {
        self.quantity += order.quantity;
        if !order.is_opaque() {
            self.sim_quantity += order.quantity;
        }
    }

    fn debit(&mut self, quantity: Quantity, is_sim: bool) {
        self.quantity = self.clamped(self.quantity - quantity);
        if is_sim {
            self.sim_quantity = self.clamped(self.sim_quantity - quantity);
        }
    }

    fn clamped(&mut self, value: Quantity) -> Quantity {
        if value < 0 {
            self.anomalies.record_clamp(self.price, -value);
            0
        } else {
            value
        }
    }

    /// Whether both running totals agree with the queue contents
    pub fn totals_consistent(&self) -> bool {
        let total: Quantity = self.queue.values().map(|lot| lot.quantity).sum();
        let sim: Quantity = self
            .queue
            .values()
            .filter(|lot| !lot.is_opaque())
            .map(|lot| lot.quantity)
            .sum();
        total == self.quantity && sim == self.sim_quantity
    }
}

impl fmt::Display for SimPriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Price level {} (qty={}, sim_qty={}, trd_qty={}, defined={}):",
            self.price, self.quantity, self.sim_quantity, self.traded_quantity, self.is_defined
        )?;
        for lot in self.queue.values() {
            if lot.is_opaque() {
                write!(f, " [*{}]", lot.quantity)?;
            } else {
                write!(f, " [{}:{}]", lot.id, lot.quantity)?;
            }
        }
        Ok(())
    }
}
