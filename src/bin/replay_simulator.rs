//! Replay Simulator
//!
//! Drives a synthetic level-2 feed through the execution engine while a
//! simple trader works limit, stop and market orders against it, with
//! periodic metrics reporting.

use chrono::Utc;
use crossbeam::channel::unbounded;
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use orderbook_sim_engine::{
    orderbook::types::*,
    utils::{format_optional_price, time::LatencyTimer},
    EngineConfig, EngineMetrics, Level2ExecutionEngine, MetricsReporter,
};

const SYMBOL: &str = "ESZ4";
const STEPS: u64 = 20_000;
const START_MID: Price = 500_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig {
            name: "CME".to_string(),
            ..EngineConfig::default()
        },
    };
    info!("Starting replay simulator with {:?}", config);

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let metrics = Arc::new(EngineMetrics::new());

    // Start metrics reporting
    let reporter = MetricsReporter::new(
        Arc::clone(&metrics),
        Duration::from_secs(config.report_interval_secs),
    );
    tokio::spawn(async move {
        reporter.run().await;
    });

    let mut engine = Level2ExecutionEngine::with_metrics(config.clone(), Arc::clone(&metrics))?;
    let (status_tx, status_rx) = unbounded::<OrderStatusEvent>();
    engine.add_order_status_listener(status_tx);
    engine.subscribe(SYMBOL)?;

    let mut feed = SyntheticFeed::new(SYMBOL, &config.name, config.book_depth, 0x2545_F491_4F6C_DD1D);
    let mut open_orders: Vec<OrderId> = Vec::new();
    let timer = LatencyTimer::start();

    for step in 0..STEPS {
        let packet = feed.next_packet();
        engine.on_book_update(&packet)?;

        let (bid, ask) = match engine.order_book(SYMBOL) {
            Some(book) => (book.best_bid_price(), book.best_ask_price()),
            None => (None, None),
        };

        let order = match (step % 200, bid, ask) {
            (0, Some(bid), _) => Some(Order::new_limit(SYMBOL, Side::Buy, bid, 5)),
            (50, _, Some(ask)) => Some(Order::new_limit(SYMBOL, Side::Sell, ask, 5)),
            (100, _, Some(ask)) => Some(Order::new_stop(SYMBOL, Side::Buy, ask + 3, 2)),
            (150, _, _) => Some(Order::new_market(SYMBOL, Side::Sell, 1)),
            _ => None,
        };
        if let Some(order) = order {
            if let Err(e) = engine.send_order(order) {
                warn!("Order rejected by engine: {}", e);
            }
        }

        // Give up on the oldest working order now and then
        if step % 500 == 499 && !open_orders.is_empty() {
            let id = open_orders.remove(0);
            if let Err(e) = engine.cancel_order(id) {
                debug!("Cancel of {} failed: {}", id, e);
            }
        }

        for event in status_rx.try_iter() {
            match event.status {
                OrderStatus::New => open_orders.push(event.order_id),
                OrderStatus::Filled | OrderStatus::PartiallyFilled => info!(
                    "{:?} {} {} @ {}",
                    event.status,
                    event.order_id,
                    event.quantity.unwrap_or(0),
                    format_optional_price(event.price, config.tick_size)
                ),
                _ => debug!("{:?} {}", event.status, event.order_id),
            }
            if event.status.is_final() {
                open_orders.retain(|id| *id != event.order_id);
            }
        }

        if step % 1_000 == 0 {
            tokio::task::yield_now().await;
        }
    }

    let elapsed = timer.elapsed();
    info!(
        "Replayed {} packets in {:?} ({:.0} packets/s), {} orders still working",
        STEPS,
        elapsed,
        timer.rate(STEPS),
        engine.open_order_count()
    );
    info!("Feed anomalies: {:?}", engine.anomalies());

    if let Some(book) = engine.order_book(SYMBOL) {
        info!(
            "Final book {} bid={} ask={} spread={:?} mid={:?}\n{}",
            SYMBOL,
            format_optional_price(book.best_bid_price(), config.tick_size),
            format_optional_price(book.best_ask_price(), config.tick_size),
            book.spread(),
            book.midpoint(),
            book
        );
        debug!("Snapshot: {}", serde_json::to_string(&book.snapshot())?);
    }
    if let Some(matcher) = engine.matching_engine(SYMBOL) {
        info!("{} simulated lots resting on {}", matcher.sim_book().order_count(), SYMBOL);
    }
    debug!("Prometheus snapshot:\n{}", prometheus.render());

    Ok(())
}

/// Deterministic random walk of a level-2 book, emitted as exchange packets
struct SyntheticFeed {
    symbol: String,
    exchange: String,
    depth: u64,
    rng: StdRng,
    mid: Price,
    clock: Timestamp,
    bids: BTreeMap<Price, Quantity>,
    asks: BTreeMap<Price, Quantity>,
}

impl SyntheticFeed {
    fn new(symbol: &str, exchange: &str, depth: usize, seed: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            depth: depth as u64,
            rng: StdRng::seed_from_u64(seed),
            mid: START_MID,
            clock: Utc::now(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    fn lots(&mut self) -> Quantity {
        self.rng.gen_range(1..=50)
    }

    fn pick_side(&mut self) -> EntryType {
        if self.rng.gen_bool(0.5) {
            EntryType::Bid
        } else {
            EntryType::Ask
        }
    }

    fn next_packet(&mut self) -> Level2Packet {
        self.clock += chrono::Duration::milliseconds(10);
        let mut packet = Level2Packet::new(&self.symbol, &self.exchange, self.clock);

        if self.bids.is_empty() || self.asks.is_empty() {
            self.recenter(&mut packet);
            return packet;
        }

        match self.rng.gen_range(0..10) {
            0 => {
                if self.rng.gen_bool(0.5) {
                    self.mid += 1;
                } else {
                    self.mid = self.mid.saturating_sub(1).max(1 + self.depth);
                }
                self.recenter(&mut packet);
            }
            1..=3 => self.trade(&mut packet),
            _ => self.refresh(&mut packet),
        }

        packet
    }

    /// Rebuild both sides around the mid, emitting deletes before news
    fn recenter(&mut self, packet: &mut Level2Packet) {
        let bid_prices: Vec<Price> = (1..=self.depth).map(|i| self.mid - i).collect();
        let ask_prices: Vec<Price> = (1..=self.depth).map(|i| self.mid + i).collect();

        for (entry, wanted) in [(EntryType::Bid, bid_prices), (EntryType::Ask, ask_prices)] {
            let stale: Vec<Price> = self
                .side(entry)
                .keys()
                .filter(|price| !wanted.contains(*price))
                .copied()
                .collect();
            for price in stale {
                self.side_mut(entry).remove(&price);
                packet.push(UpdateAction::Delete, entry, price, 0, 0);
            }

            for price in wanted {
                if !self.side(entry).contains_key(&price) {
                    let quantity = self.lots();
                    self.side_mut(entry).insert(price, quantity);
                    packet.push(UpdateAction::New, entry, price, quantity, 1);
                }
            }
        }
    }

    /// Trade print at the touch followed by the level shrinking
    fn trade(&mut self, packet: &mut Level2Packet) {
        let entry = self.pick_side();
        let best = match entry {
            EntryType::Bid => self.bids.iter().next_back().map(|(p, q)| (*p, *q)),
            _ => self.asks.iter().next().map(|(p, q)| (*p, *q)),
        };
        let Some((price, resting)) = best else {
            return;
        };

        let traded = self.lots().min(resting);
        packet.push_trade(price, traded);

        if traded == resting {
            self.side_mut(entry).remove(&price);
            packet.push(UpdateAction::Delete, entry, price, 0, 0);
        } else {
            self.side_mut(entry).insert(price, resting - traded);
            packet.push(UpdateAction::Change, entry, price, resting - traded, 1);
        }
    }

    /// Size joining or leaving a random level without trading
    fn refresh(&mut self, packet: &mut Level2Packet) {
        let entry = self.pick_side();
        let prices: Vec<Price> = self.side(entry).keys().copied().collect();
        if prices.is_empty() {
            return;
        }
        let price = prices[self.rng.gen_range(0..prices.len())];
        let delta = self.lots() - 25;

        let Some(current) = self.side(entry).get(&price).copied() else {
            return;
        };
        let quantity = (current + delta).max(1);
        self.side_mut(entry).insert(price, quantity);
        packet.push(UpdateAction::Change, entry, price, quantity, 1);
    }

    fn side(&self, entry: EntryType) -> &BTreeMap<Price, Quantity> {
        match entry {
            EntryType::Bid => &self.bids,
            _ => &self.asks,
        }
    }

    fn side_mut(&mut self, entry: EntryType) -> &mut BTreeMap<Price, Quantity> {
        match entry {
            EntryType::Bid => &mut self.bids,
            _ => &mut self.asks,
        }
    }
}
