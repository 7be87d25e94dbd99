//! Market-observed order book
//!
//! Aggregate level-2 depth per side, rebuilt from New/Change/Delete
//! refreshes, plus the shared order, message and status types.

pub mod anomalies;
pub mod book;
pub mod error;
pub mod ladder;
pub mod price_level;
pub mod types;

// Re-export main types for convenience
pub use anomalies::FeedAnomalies;
pub use book::ExchangeOrderBook;
pub use error::{EngineError, EngineResult};
pub use ladder::{BookPrice, Ladder, LadderDelta};
pub use price_level::PriceLevel;
pub use types::{
    BookSnapshot, EntryType, Level2Message, Level2Packet, LimitOrder, MarketOrder, Order,
    OrderId, OrderStatus, OrderStatusEvent, Price, PriceLevelInfo, Quantity, Side, StopOrder,
    TimeInForce, Timestamp, UpdateAction,
};
