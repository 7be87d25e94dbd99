//! Simulated queues for trader orders, overlaid on the market-observed book.
//!
//! Trader lots share FIFO queues with opaque lots that stand for everyone
//! else's size. The queues are kept in step with the exchange ladder by
//! replaying its deltas, so fills follow price-time priority even though
//! the real queue is never visible.

pub mod book;
pub mod fifo;
pub mod ladder;
pub mod price_level;

pub use book::{OrderLocation, SimBook};
pub use fifo::FifoMatchingEngine;
pub use ladder::SimLadder;
pub use price_level::{LotHandle, SimOrder, SimPriceLevel};
