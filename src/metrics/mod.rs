use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::info;

/// Metrics collector for the execution engine
#[derive(Debug)]
pub struct EngineMetrics {
    // Latency tracking
    update_latency: LatencyTracker,
    submit_latency: LatencyTracker,
    cancel_latency: LatencyTracker,

    // Throughput counters
    updates_processed: AtomicU64,
    updates_dropped: AtomicU64,
    orders_sent: AtomicU64,
    orders_cancelled: AtomicU64,
    orders_rejected: AtomicU64,
    fills: AtomicU64,
    filled_quantity: AtomicU64,
    stops_triggered: AtomicU64,

    // Book state
    resting_orders: AtomicU64,
    feed_anomalies: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        // Register metric descriptions
        describe_counter!("engine_updates_total", "Level-2 entries processed or dropped");
        describe_counter!("engine_orders_total", "Trader orders by outcome");
        describe_counter!("engine_fills_total", "Fill and partial fill reports");
        describe_counter!("engine_stops_triggered_total", "Stop orders converted to fills");
        describe_counter!("feed_anomalies_total", "Feed inconsistencies tolerated by the books");
        describe_histogram!(
            "engine_operation_duration_seconds",
            "Duration of engine operations"
        );
        describe_gauge!("engine_resting_orders", "Trader orders currently resting");
        describe_gauge!("engine_feed_anomalies", "Feed anomalies seen so far");

        Self {
            update_latency: LatencyTracker::new("book_update"),
            submit_latency: LatencyTracker::new("send_order"),
            cancel_latency: LatencyTracker::new("cancel_order"),
            updates_processed: AtomicU64::new(0),
            updates_dropped: AtomicU64::new(0),
            orders_sent: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            fills: AtomicU64::new(0),
            filled_quantity: AtomicU64::new(0),
            stops_triggered: AtomicU64::new(0),
            resting_orders: AtomicU64::new(0),
            feed_anomalies: AtomicU64::new(0),
        }
    }

    // Latency measurement methods
    pub fn time_update<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.update_latency.time(f)
    }

    pub fn time_submit<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.submit_latency.time(f)
    }

    pub fn time_cancel<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.cancel_latency.time(f)
    }

    // Counter methods
    pub fn increment_updates_processed(&self, entries: u64) {
        self.updates_processed.fetch_add(entries, Ordering::Relaxed);
        counter!("engine_updates_total", "outcome" => "processed").increment(entries);
    }

    pub fn increment_updates_dropped(&self, reason: &'static str) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
        counter!("engine_updates_total", "outcome" => "dropped", "reason" => reason).increment(1);
    }

    pub fn increment_orders_sent(&self, kind: &'static str) {
        self.orders_sent.fetch_add(1, Ordering::Relaxed);
        counter!("engine_orders_total", "operation" => "send", "kind" => kind).increment(1);
    }

    pub fn increment_orders_cancelled(&self) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
        counter!("engine_orders_total", "operation" => "cancel").increment(1);
    }

    pub fn increment_orders_rejected(&self) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("engine_orders_total", "operation" => "reject").increment(1);
    }

    pub fn increment_fills(&self, quantity: u64) {
        self.fills.fetch_add(1, Ordering::Relaxed);
        self.filled_quantity.fetch_add(quantity, Ordering::Relaxed);
        counter!("engine_fills_total").increment(1);
        counter!("engine_filled_quantity_total").increment(quantity);
    }

    pub fn increment_stops_triggered(&self) {
        self.stops_triggered.fetch_add(1, Ordering::Relaxed);
        counter!("engine_stops_triggered_total").increment(1);
    }

    // Gauge methods
    pub fn set_resting_orders(&self, count: u64) {
        self.resting_orders.store(count, Ordering::Relaxed);
        gauge!("engine_resting_orders").set(count as f64);
    }

    pub fn set_feed_anomalies(&self, count: u64) {
        self.feed_anomalies.store(count, Ordering::Relaxed);
        gauge!("engine_feed_anomalies").set(count as f64);
    }

    // Getters for current values
    pub fn get_updates_processed(&self) -> u64 {
        self.updates_processed.load(Ordering::Relaxed)
    }

    pub fn get_updates_dropped(&self) -> u64 {
        self.updates_dropped.load(Ordering::Relaxed)
    }

    pub fn get_orders_sent(&self) -> u64 {
        self.orders_sent.load(Ordering::Relaxed)
    }

    pub fn get_orders_cancelled(&self) -> u64 {
        self.orders_cancelled.load(Ordering::Relaxed)
    }

    pub fn get_orders_rejected(&self) -> u64 {
        self.orders_rejected.load(Ordering::Relaxed)
    }

    pub fn get_fills(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    pub fn get_filled_quantity(&self) -> u64 {
        self.filled_quantity.load(Ordering::Relaxed)
    }

    pub fn get_stops_triggered(&self) -> u64 {
        self.stops_triggered.load(Ordering::Relaxed)
    }

    pub fn get_resting_orders(&self) -> u64 {
        self.resting_orders.load(Ordering::Relaxed)
    }

    pub fn get_feed_anomalies(&self) -> u64 {
        self.feed_anomalies.load(Ordering::Relaxed)
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        LatencyStats {
            book_update: self.update_latency.get_stats(),
            send_order: self.submit_latency.get_stats(),
            cancel_order: self.cancel_latency.get_stats(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency tracker for individual operations
#[derive(Debug)]
struct LatencyTracker {
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record_latency(start.elapsed());
        result
    }

    fn record_latency(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!("engine_operation_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());
    }

    fn get_stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);
        let max = self.max_nanos.load(Ordering::Relaxed);

        let avg = if samples > 0 { total / samples } else { 0 };

        OperationLatencyStats {
            operation: self.operation.to_string(),
            samples,
            avg_nanos: avg,
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub book_update: OperationLatencyStats,
    pub send_order: OperationLatencyStats,
    pub cancel_order: OperationLatencyStats,
}

#[derive(Debug, Clone)]
pub struct OperationLatencyStats {
    pub operation: String,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }

    pub fn min_micros(&self) -> f64 {
        self.min_nanos as f64 / 1_000.0
    }

    pub fn max_micros(&self) -> f64 {
        self.max_nanos as f64 / 1_000.0
    }
}

/// Background metrics reporter
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    /// One summary line of the current counters
    pub fn summary(&self) -> String {
        let stats = self.metrics.get_latency_stats();

        format!(
            "Engine Metrics - Updates: {} (dropped {}) | Orders: +{} -{} !{} | Fills: {} ({} lots) | Stops: {} | Resting: {} | Anomalies: {} | Latency (μs): update={:.2} send={:.2} cancel={:.2}",
            self.metrics.get_updates_processed(),
            self.metrics.get_updates_dropped(),
            self.metrics.get_orders_sent(),
            self.metrics.get_orders_cancelled(),
            self.metrics.get_orders_rejected(),
            self.metrics.get_fills(),
            self.metrics.get_filled_quantity(),
            self.metrics.get_stops_triggered(),
            self.metrics.get_resting_orders(),
            self.metrics.get_feed_anomalies(),
            stats.book_update.avg_micros(),
            stats.send_order.avg_micros(),
            stats.cancel_order.avg_micros(),
        )
    }

    pub async fn run(&self) {
        let mut interval = interval(self.interval);

        loop {
            interval.tick().await;
            info!("{}", self.summary());
        }
    }
}
