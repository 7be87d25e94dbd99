//! Level-2 Order Book Simulation Engine
//!
//! Rebuilds exchange price ladders from incremental level-2 refreshes and
//! overlays a trader's simulated orders on them, so strategies get fills,
//! partial fills and cancels with realistic queue priority without an
//! exchange matching engine.
//!
//! # Features
//!
//! - **Market Ladders**: bounded-depth bid/ask ladders rebuilt from New/Change/Delete deltas
//! - **Simulated FIFO Queues**: trader lots queued among opaque lots standing for other participants
//! - **Trade-aware Fills**: trade prints decide whether a shrinking level filled or cancelled
//! - **Order Types**: Market, Limit and Stop orders with status events
//! - **Observability**: feed anomaly counters, `tracing` logs, `metrics` counters and latencies
//!
//! # Quick Start
//!
//! ```rust
//! use orderbook_sim_engine::prelude::*;
//! use crossbeam::channel::unbounded;
//!
//! let config = EngineConfig { name: "CME".to_string(), ..EngineConfig::default() };
//! let mut engine = Level2ExecutionEngine::new(config)?;
//! let (tx, rx) = unbounded::<OrderStatusEvent>();
//! engine.add_order_status_listener(tx);
//! engine.subscribe("ESZ4")?;
//!
//! let mut packet = Level2Packet::new("ESZ4", "CME", Timestamp::default());
//! packet
//!     .push(UpdateAction::New, EntryType::Bid, 100, 40, 3)
//!     .push(UpdateAction::New, EntryType::Ask, 101, 50, 4);
//! engine.on_book_update(&packet)?;
//!
//! // Buy through the best ask
//! engine.send_order(Order::new_limit("ESZ4", Side::Buy, 101, 20))?;
//!
//! let last = rx.try_iter().last().unwrap();
//! assert_eq!(last.status, OrderStatus::Filled);
//! assert_eq!(last.price, Some(101));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! 1. **Market view** (`orderbook`): `Ladder` keeps aggregate depth per price and reports
//!    the signed delta of every refresh
//! 2. **Simulated book** (`simulation`): `SimPriceLevel` queues replay those deltas,
//!    growing at the tail, shrinking opaque size first, and executing from the head
//!    when a trade accounts for the shrink
//! 3. **Execution** (`execution`): `Level2ExecutionEngine` routes orders per symbol,
//!    manages stops, and reports status and book changes to listeners

pub mod config;
pub mod execution;
pub mod metrics;
pub mod orderbook;
pub mod simulation;
pub mod utils;

pub use config::EngineConfig;
pub use execution::{ExecutionEngine, Level2ExecutionEngine};
pub use metrics::{EngineMetrics, MetricsReporter};
pub use orderbook::{EngineError, EngineResult, ExchangeOrderBook};
pub use simulation::FifoMatchingEngine;

/// Everything needed to drive an engine
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::execution::{
        BookChangedListener, ExecutionEngine, Level2ExecutionEngine, OrderStatusListener,
    };
    pub use crate::orderbook::types::*;
    pub use crate::orderbook::{EngineError, EngineResult, ExchangeOrderBook, FeedAnomalies};
    pub use crate::simulation::FifoMatchingEngine;
}
