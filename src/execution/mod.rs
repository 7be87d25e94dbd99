//! Order entry on top of the simulated books
//!
//! Routes market, limit and stop orders for every subscribed symbol and
//! reports status changes and applied packets to registered listeners.

pub mod engine;
pub mod listener;
pub mod stops;

pub use engine::{ExecutionEngine, Level2ExecutionEngine};
pub use listener::{BookChangedListener, OrderStatusListener};
pub use stops::StopBook;
