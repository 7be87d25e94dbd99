use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::types::OrderId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    /// Order id is not known to the engine
    OrderNotFound(OrderId),

    /// Symbol has no matching engine
    UnknownSymbol(String),

    /// Exchange is not served by this engine
    UnknownExchange(String),

    /// Symbol already has a matching engine
    AlreadySubscribed(String),

    /// Order id already in use
    DuplicateOrder(OrderId),

    /// Invalid quantity (zero or negative)
    InvalidQuantity,

    /// Invalid price (zero)
    InvalidPrice,

    /// Rejected configuration value
    InvalidConfig(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::OrderNotFound(id) => write!(f, "Order not found: {}", id),
            EngineError::UnknownSymbol(symbol) => write!(f, "Unknown symbol: {}", symbol),
            EngineError::UnknownExchange(exchange) => write!(f, "Unknown exchange: {}", exchange),
            EngineError::AlreadySubscribed(symbol) => {
                write!(f, "Symbol '{}' already subscribed", symbol)
            }
            EngineError::DuplicateOrder(id) => write!(f, "Order already exists: {}", id),
            EngineError::InvalidQuantity => write!(f, "Invalid quantity"),
            EngineError::InvalidPrice => write!(f, "Invalid price"),
            EngineError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
