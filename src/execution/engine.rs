use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::execution::listener::{BookChangedListener, OrderStatusListener};
use crate::execution::stops::{trigger_price, StopBook};
use crate::metrics::EngineMetrics;
use crate::orderbook::anomalies::FeedAnomalies;
use crate::orderbook::book::ExchangeOrderBook;
use crate::orderbook::error::{EngineError, EngineResult};
use crate::orderbook::types::{
    Level2Packet, LimitOrder, MarketOrder, Order, OrderId, OrderStatus, OrderStatusEvent, Side,
    StopOrder, Timestamp,
};
use crate::simulation::fifo::FifoMatchingEngine;

/// Order entry and cancellation seam shared by execution engines
pub trait ExecutionEngine {
    fn name(&self) -> &str;
    fn subscribe(&mut self, symbol: &str) -> EngineResult<()>;
    fn send_order(&mut self, order: Order) -> EngineResult<()>;
    fn cancel_order(&mut self, id: OrderId) -> EngineResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestingKind {
    Limit,
    Stop,
}

#[derive(Debug, Clone)]
struct RestingOrder {
    symbol: String,
    kind: RestingKind,
}

/// Execution engine that fills trader orders against level-2 books.
///
/// One [`FifoMatchingEngine`] per subscribed symbol. Limit orders go to
/// the simulated queues, market orders fill at the top of book, stop orders
/// wait in a per-symbol [`StopBook`] until the top of book reaches them.
pub struct Level2ExecutionEngine {
    config: EngineConfig,
    books: HashMap<String, FifoMatchingEngine>,
    stops: HashMap<String, StopBook>,
    orders: HashMap<OrderId, RestingOrder>,
    status_listeners: Vec<Box<dyn OrderStatusListener>>,
    book_listeners: Vec<Box<dyn BookChangedListener>>,
    time: Timestamp,
    metrics: Arc<EngineMetrics>,
}

impl Level2ExecutionEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_metrics(config, Arc::new(EngineMetrics::new()))
    }

    pub fn with_metrics(config: EngineConfig, metrics: Arc<EngineMetrics>) -> EngineResult<Self> {
        config.validate()?;
        info!(
            "Creating level-2 execution engine {} with depth {}",
            config.name, config.book_depth
        );

        Ok(Self {
            config,
            books: HashMap::new(),
            stops: HashMap::new(),
            orders: HashMap::new(),
            status_listeners: Vec::new(),
            book_listeners: Vec::new(),
            time: Timestamp::default(),
            metrics,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn add_order_status_listener<L>(&mut self, listener: L)
    where
        L: OrderStatusListener + 'static,
    {
        self.status_listeners.push(Box::new(listener));
    }

    pub fn add_book_changed_listener<L>(&mut self, listener: L)
    where
        L: BookChangedListener + 'static,
    {
        self.book_listeners.push(Box::new(listener));
    }

    pub fn matching_engine(&self, symbol: &str) -> Option<&FifoMatchingEngine> {
        self.books.get(symbol)
    }

    pub fn order_book(&self, symbol: &str) -> Option<&ExchangeOrderBook> {
        self.books.get(symbol).map(FifoMatchingEngine::order_book)
    }

    /// Trader orders still live (resting limits and waiting stops)
    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn anomalies(&self) -> FeedAnomalies {
        self.books
            .values()
            .fold(FeedAnomalies::default(), |acc, book| acc.merge(&book.anomalies()))
    }

    pub fn subscribe(&mut self, symbol: &str) -> EngineResult<()> {
        if self.books.contains_key(symbol) {
            error!("{}: symbol '{}' already subscribed", self.config.name, symbol);
            return Err(EngineError::AlreadySubscribed(symbol.to_string()));
        }

        let engine = FifoMatchingEngine::new(symbol, &self.config.name, self.config.book_depth);
        self.books.insert(symbol.to_string(), engine);
        self.stops.insert(symbol.to_string(), StopBook::new());
        info!("{}: subscribed {}", self.config.name, symbol);
        Ok(())
    }

    pub fn send_order(&mut self, order: Order) -> EngineResult<()> {
        self.validate(&order)?;

        let metrics = Arc::clone(&self.metrics);
        metrics.time_submit(|| {
            let mut events = vec![OrderStatusEvent::pending_new(order.id(), self.time)];
            match order {
                Order::Market(market) => self.execute_market(market, &mut events),
                Order::Limit(limit) => self.place_limit(limit, &mut events),
                Order::Stop(stop) => self.place_stop(stop, &mut events),
            }
            self.publish(events);
        });

        Ok(())
    }

    fn validate(&self, order: &Order) -> EngineResult<()> {
        if !self.books.contains_key(order.symbol()) {
            warn!("{}: order for unsubscribed {}", self.config.name, order.symbol());
            return Err(EngineError::UnknownSymbol(order.symbol().to_string()));
        }
        if self.orders.contains_key(&order.id()) {
            return Err(EngineError::DuplicateOrder(order.id()));
        }
        if order.quantity() <= 0 {
            return Err(EngineError::InvalidQuantity);
        }

        let price = match order {
            Order::Limit(limit) => Some(limit.price),
            Order::Stop(stop) => Some(stop.stop_price),
            Order::Market(_) => None,
        };
        if price == Some(0) {
            return Err(EngineError::InvalidPrice);
        }

        Ok(())
    }

    fn execute_market(&mut self, order: MarketOrder, events: &mut Vec<OrderStatusEvent>) {
        self.metrics.increment_orders_sent("market");

        if let Some(price) = order.fill_price {
            events.push(OrderStatusEvent::filled(order.id, self.time, price, order.quantity));
            return;
        }

        let Some(book) = self.books.get(&order.symbol) else {
            return;
        };

        let (best, reason) = match order.side {
            Side::Buy => (book.best_ask_price(), "No asks in order book"),
            Side::Sell => (book.best_bid_price(), "No bids in order book"),
        };

        match best {
            Some(price) => {
                events.push(OrderStatusEvent::filled(order.id, self.time, price, order.quantity))
            }
            None => {
                warn!("{}: market order {} rejected: {}", self.config.name, order.id, reason);
                events.push(OrderStatusEvent::rejected(order.id, self.time, reason));
            }
        }
    }

    fn place_limit(&mut self, order: LimitOrder, events: &mut Vec<OrderStatusEvent>) {
        self.metrics.increment_orders_sent("limit");

        let Some(book) = self.books.get_mut(&order.symbol) else {
            return;
        };

        self.orders.insert(
            order.id,
            RestingOrder {
                symbol: order.symbol.clone(),
                kind: RestingKind::Limit,
            },
        );
        events.push(OrderStatusEvent::new_order(order.id, self.time));

        let resting = book.send_order(&order, self.time, events);
        debug!(
            "{}: limit {} {} {}@{} resting {}",
            self.config.name, order.id, order.side, order.quantity, order.price, resting
        );
    }

    fn place_stop(&mut self, order: StopOrder, events: &mut Vec<OrderStatusEvent>) {
        self.metrics.increment_orders_sent("stop");

        let Some(book) = self.books.get(&order.symbol) else {
            return;
        };

        let fill = trigger_price(
            order.side,
            order.stop_price,
            book.best_bid_price(),
            book.best_ask_price(),
        );
        if let Some(price) = fill {
            self.metrics.increment_stops_triggered();
            events.push(OrderStatusEvent::filled(order.id, self.time, price, order.quantity));
            return;
        }

        self.orders.insert(
            order.id,
            RestingOrder {
                symbol: order.symbol.clone(),
                kind: RestingKind::Stop,
            },
        );
        events.push(OrderStatusEvent::new_order(order.id, self.time));
        if let Some(stops) = self.stops.get_mut(&order.symbol) {
            stops.add(order);
        }
    }

    pub fn cancel_order(&mut self, id: OrderId) -> EngineResult<()> {
        let metrics = Arc::clone(&self.metrics);
        metrics.time_cancel(|| self.cancel(id))
    }

    fn cancel(&mut self, id: OrderId) -> EngineResult<()> {
        let Some(entry) = self.orders.remove(&id) else {
            error!("{}: cannot cancel order id={}", self.config.name, id);
            return Err(EngineError::OrderNotFound(id));
        };

        let mut events = Vec::new();
        match entry.kind {
            RestingKind::Limit => {
                let book = self
                    .books
                    .get_mut(&entry.symbol)
                    .ok_or_else(|| EngineError::UnknownSymbol(entry.symbol.clone()))?;
                book.cancel_order(id, self.time, &mut events)?;
            }
            RestingKind::Stop => {
                self.stops
                    .get_mut(&entry.symbol)
                    .and_then(|stops| stops.remove(id))
                    .ok_or(EngineError::OrderNotFound(id))?;
                events.push(OrderStatusEvent::cancelled(id, self.time, "Canceled by trader"));
            }
        }

        self.metrics.increment_orders_cancelled();
        self.publish(events);
        Ok(())
    }

    /// Apply one exchange packet, fill what it triggers, then tell listeners.
    /// A packet from another exchange is a wiring error and is refused;
    /// one for an unsubscribed symbol is dropped.
    pub fn on_book_update(&mut self, packet: &Level2Packet) -> EngineResult<()> {
        if packet.exchange != self.config.name {
            error!(
                "{}: packet from exchange {} refused",
                self.config.name, packet.exchange
            );
            self.metrics.increment_updates_dropped("unknown_exchange");
            return Err(EngineError::UnknownExchange(packet.exchange.clone()));
        }

        let Some(book) = self.books.get_mut(&packet.symbol) else {
            warn!(
                "{}: dropping packet for unsubscribed {}",
                self.config.name, packet.symbol
            );
            self.metrics.increment_updates_dropped("unknown_symbol");
            return Ok(());
        };

        self.time = packet.time;
        let mut events = Vec::new();
        self.metrics.time_update(|| {
            for msg in &packet.messages {
                book.update(msg, &mut events);
            }
            book.end_cycle();
        });

        let (best_bid, best_ask) = (book.best_bid_price(), book.best_ask_price());
        if let Some(stops) = self.stops.get_mut(&packet.symbol) {
            for (order, price) in stops.take_triggered(best_bid, best_ask) {
                info!(
                    "{}: stop {} {} @{} triggered, filling at {}",
                    self.config.name, order.id, order.side, order.stop_price, price
                );
                self.metrics.increment_stops_triggered();
                events.push(OrderStatusEvent::filled(order.id, self.time, price, order.quantity));
            }
        }

        self.metrics
            .increment_updates_processed(packet.messages.len() as u64);
        self.metrics.set_feed_anomalies(self.anomalies().total());
        self.publish(events);

        for listener in self.book_listeners.iter_mut() {
            listener.on_book_changed(packet);
        }
        Ok(())
    }

    fn publish(&mut self, events: Vec<OrderStatusEvent>) {
        for event in &events {
            match event.status {
                OrderStatus::Filled | OrderStatus::PartiallyFilled => {
                    self.metrics
                        .increment_fills(event.quantity.unwrap_or(0).max(0) as u64);
                }
                OrderStatus::Rejected => self.metrics.increment_orders_rejected(),
                _ => {}
            }
            if event.status.is_final() {
                self.orders.remove(&event.order_id);
            }

            for listener in self.status_listeners.iter_mut() {
                listener.on_order_status(event);
            }
        }

        self.metrics.set_resting_orders(self.orders.len() as u64);
    }
}

impl ExecutionEngine for Level2ExecutionEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn subscribe(&mut self, symbol: &str) -> EngineResult<()> {
        Level2ExecutionEngine::subscribe(self, symbol)
    }

    fn send_order(&mut self, order: Order) -> EngineResult<()> {
        Level2ExecutionEngine::send_order(self, order)
    }

    fn cancel_order(&mut self, id: OrderId) -> EngineResult<()> {
        Level2ExecutionEngine::cancel_order(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::{EntryType, UpdateAction};
    use crossbeam::channel::{unbounded, Receiver};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn config() -> EngineConfig {
        EngineConfig {
            name: "CME".to_string(),
            book_depth: 5,
            ..EngineConfig::default()
        }
    }

    fn packet(entries: &[(UpdateAction, EntryType, u64, i64)]) -> Level2Packet {
        let mut packet = Level2Packet::new("ESZ4", "CME", Timestamp::default());
        for &(action, entry, price, quantity) in entries {
            packet.push(action, entry, price, quantity, 1);
        }
        packet
    }

    fn engine() -> (Level2ExecutionEngine, Receiver<OrderStatusEvent>) {
        let mut engine = Level2ExecutionEngine::new(config()).unwrap();
        let (tx, rx) = unbounded::<OrderStatusEvent>();
        engine.add_order_status_listener(tx);
        engine.subscribe("ESZ4").unwrap();
        engine.on_book_update(&packet(&[
            (UpdateAction::New, EntryType::Bid, 100, 40),
            (UpdateAction::New, EntryType::Bid, 99, 20),
            (UpdateAction::New, EntryType::Ask, 101, 50),
            (UpdateAction::New, EntryType::Ask, 102, 100),
        ])).unwrap();
        (engine, rx)
    }

    fn statuses(rx: &Receiver<OrderStatusEvent>) -> Vec<OrderStatus> {
        rx.try_iter().map(|event| event.status).collect()
    }

    #[test]
    fn test_duplicate_subscription_fails() {
        let (mut engine, _rx) = engine();

        assert_eq!(
            engine.subscribe("ESZ4"),
            Err(EngineError::AlreadySubscribed("ESZ4".to_string()))
        );
        assert!(engine.subscribe("NQZ4").is_ok());
    }

    #[test]
    fn test_market_order_fills_at_best_opposite() {
        let (mut engine, rx) = engine();

        engine.send_order(Order::new_market("ESZ4", Side::Buy, 10)).unwrap();
        engine.send_order(Order::new_market("ESZ4", Side::Sell, 10)).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].status, OrderStatus::PendingNew);
        assert_eq!(events[1].status, OrderStatus::Filled);
        assert_eq!(events[1].price, Some(101));
        assert_eq!(events[3].price, Some(100));
        assert_eq!(engine.open_order_count(), 0);
    }

    #[test]
    fn test_market_order_rejected_on_empty_side() {
        let mut engine = Level2ExecutionEngine::new(config()).unwrap();
        let (tx, rx) = unbounded::<OrderStatusEvent>();
        engine.add_order_status_listener(tx);
        engine.subscribe("ESZ4").unwrap();

        engine.send_order(Order::new_market("ESZ4", Side::Buy, 10)).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events[1].status, OrderStatus::Rejected);
        assert_eq!(events[1].reason.as_deref(), Some("No asks in order book"));
        assert_eq!(engine.metrics().get_orders_rejected(), 1);
    }

    #[test]
    fn test_market_order_with_preset_fill_price() {
        let (mut engine, rx) = engine();
        let mut order = Order::new_market("ESZ4", Side::Buy, 3);
        if let Order::Market(market) = &mut order {
            market.fill_price = Some(150);
        }

        engine.send_order(order).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events[1].price, Some(150));
    }

    #[test]
    fn test_limit_order_crossing_two_levels() {
        let (mut engine, rx) = engine();
        let order = Order::new_limit("ESZ4", Side::Buy, 103, 120);
        let id = order.id();

        engine.send_order(order).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        let seen: Vec<_> = events
            .iter()
            .map(|e| (e.status, e.price, e.quantity))
            .collect();
        assert_eq!(
            seen,
            vec![
                (OrderStatus::PendingNew, None, None),
                (OrderStatus::New, None, None),
                (OrderStatus::PartiallyFilled, Some(101), Some(50)),
                (OrderStatus::Filled, Some(102), Some(70)),
            ]
        );
        assert!(events.iter().all(|e| e.order_id == id));
        assert_eq!(engine.open_order_count(), 0);
        // Market view stays as published
        assert_eq!(
            engine.order_book("ESZ4").unwrap().level_at(Side::Sell, 102).unwrap().quantity,
            100
        );
    }

    #[test]
    fn test_buy_stop_waits_for_trigger() {
        let (mut engine, rx) = engine();
        let order = Order::new_stop("ESZ4", Side::Buy, 105, 5);
        let id = order.id();

        engine.send_order(order).unwrap();
        assert_eq!(statuses(&rx), vec![OrderStatus::PendingNew, OrderStatus::New]);

        engine.on_book_update(&packet(&[
            (UpdateAction::Delete, EntryType::Ask, 101, 0),
            (UpdateAction::Delete, EntryType::Ask, 102, 0),
            (UpdateAction::New, EntryType::Ask, 104, 30),
        ])).unwrap();
        assert!(rx.try_recv().is_err());

        engine.on_book_update(&packet(&[
            (UpdateAction::Delete, EntryType::Ask, 104, 0),
            (UpdateAction::New, EntryType::Ask, 105, 30),
        ])).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id, id);
        assert_eq!(events[0].status, OrderStatus::Filled);
        assert_eq!(events[0].price, Some(105));
        assert_eq!(engine.metrics().get_stops_triggered(), 1);
        assert_eq!(engine.open_order_count(), 0);
    }

    #[test]
    fn test_sell_stop_already_through_fills_at_once() {
        let (mut engine, rx) = engine();

        engine.send_order(Order::new_stop("ESZ4", Side::Sell, 100, 5)).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, OrderStatus::Filled);
        assert_eq!(events[1].price, Some(100));
    }

    #[test]
    fn test_cancel_resting_orders() {
        let (mut engine, rx) = engine();
        let limit = Order::new_limit("ESZ4", Side::Buy, 100, 10);
        let stop = Order::new_stop("ESZ4", Side::Sell, 95, 5);
        let (limit_id, stop_id) = (limit.id(), stop.id());
        engine.send_order(limit).unwrap();
        engine.send_order(stop).unwrap();
        let _ = rx.try_iter().count();

        engine.cancel_order(limit_id).unwrap();
        engine.cancel_order(stop_id).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.status == OrderStatus::Canceled));
        assert_eq!(events[0].reason.as_deref(), Some("Canceled by trader"));
        assert_eq!(engine.open_order_count(), 0);
        assert_eq!(
            engine.cancel_order(limit_id),
            Err(EngineError::OrderNotFound(limit_id))
        );
    }

    #[test]
    fn test_order_validation() {
        let (mut engine, _rx) = engine();

        assert_eq!(
            engine.send_order(Order::new_limit("NQZ4", Side::Buy, 100, 1)),
            Err(EngineError::UnknownSymbol("NQZ4".to_string()))
        );
        assert_eq!(
            engine.send_order(Order::new_limit("ESZ4", Side::Buy, 100, 0)),
            Err(EngineError::InvalidQuantity)
        );
        assert_eq!(
            engine.send_order(Order::new_limit("ESZ4", Side::Buy, 0, 1)),
            Err(EngineError::InvalidPrice)
        );

        let order = Order::new_limit("ESZ4", Side::Buy, 100, 1);
        let id = order.id();
        engine.send_order(order.clone()).unwrap();
        assert_eq!(engine.send_order(order), Err(EngineError::DuplicateOrder(id)));
    }

    #[test]
    fn test_foreign_packets_are_dropped() {
        let (mut engine, _rx) = engine();
        let (tx, books) = unbounded::<Level2Packet>();
        engine.add_book_changed_listener(tx);

        // Unsubscribed symbol: logged and dropped
        assert!(engine
            .on_book_update(&Level2Packet::new("NQZ4", "CME", Timestamp::default()))
            .is_ok());
        // Foreign venue: refused
        assert_eq!(
            engine.on_book_update(&Level2Packet::new("ESZ4", "EUREX", Timestamp::default())),
            Err(EngineError::UnknownExchange("EUREX".to_string()))
        );

        assert!(books.try_recv().is_err());
        assert_eq!(engine.metrics().get_updates_dropped(), 2);
    }

    #[test]
    fn test_fills_reported_before_book_changed() {
        let (mut engine, _rx) = engine();
        let log = Rc::new(RefCell::new(Vec::new()));

        let status_log = Rc::clone(&log);
        engine.add_order_status_listener(move |event: &OrderStatusEvent| {
            status_log.borrow_mut().push(format!("{:?}", event.status));
        });
        let book_log = Rc::clone(&log);
        engine.add_book_changed_listener(move |packet: &Level2Packet| {
            book_log.borrow_mut().push(format!("book {}", packet.messages.len()));
        });

        engine.send_order(Order::new_limit("ESZ4", Side::Sell, 101, 10)).unwrap();
        engine.on_book_update(&packet(&[(UpdateAction::New, EntryType::Bid, 101, 5)])).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["PendingNew", "New", "Filled", "book 1"]
        );
    }

    #[test]
    fn test_feed_anomalies_are_exposed() {
        let (mut engine, _rx) = engine();

        engine.on_book_update(&packet(&[(UpdateAction::Delete, EntryType::Bid, 90, 0)])).unwrap();

        assert_eq!(engine.anomalies().unknown_level_deletes, 1);
        assert_eq!(engine.metrics().get_feed_anomalies(), 1);
    }

    #[test]
    fn test_trade_print_does_not_outlive_its_packet() {
        let (mut engine, rx) = engine();
        engine.send_order(Order::new_limit("ESZ4", Side::Buy, 100, 10)).unwrap();

        // Size joins behind the trader, then a print with no shrink
        engine.on_book_update(&packet(&[(UpdateAction::Change, EntryType::Bid, 100, 60)])).unwrap();
        let mut print = Level2Packet::new("ESZ4", "CME", Timestamp::default());
        print.push_trade(100, 5);
        engine.on_book_update(&print).unwrap();

        // A later shrink with no trade of its own is a cancel from the tail
        engine.on_book_update(&packet(&[(UpdateAction::Change, EntryType::Bid, 100, 45)])).unwrap();

        let level = engine
            .matching_engine("ESZ4")
            .unwrap()
            .sim_book()
            .bids()
            .level(100)
            .unwrap();
        let queue: Vec<_> = level.iter().map(|lot| (lot.is_opaque(), lot.quantity)).collect();
        assert_eq!(queue, vec![(true, 40), (false, 10), (true, 5)]);
        assert_eq!(level.traded_quantity, 0);
        assert_eq!(statuses(&rx), vec![OrderStatus::PendingNew, OrderStatus::New]);
    }
}
