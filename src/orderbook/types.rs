use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type OrderId = Uuid;
pub type Price = u64; // Price in ticks (e.g., 1 tick = 0.01 cents)
pub type Quantity = i64; // Signed lots, deltas can be negative
pub type Timestamp = DateTime<Utc>;

/// Id carried by lots that belong to unknown market participants.
pub const OPAQUE_ORDER_ID: OrderId = Uuid::nil();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// True when an order on this side at `limit` would trade against
    /// a resting opposite level at `level_price`.
    pub fn crosses(self, limit: Price, level_price: Price) -> bool {
        match self {
            Side::Buy => limit >= level_price,
            Side::Sell => limit <= level_price,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Bid,
    Ask,
    Trade,
}

impl EntryType {
    /// Book side touched by this entry, `None` for trade prints.
    pub fn side(self) -> Option<Side> {
        match self {
            EntryType::Bid => Some(Side::Buy),
            EntryType::Ask => Some(Side::Sell),
            EntryType::Trade => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateAction {
    New,
    Change,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

/// Incremental level-2 refresh for one price of one side (or a trade print)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level2Message {
    pub symbol: String,
    pub exchange: String,
    pub time: Timestamp,
    pub update_action: UpdateAction,
    pub entry_type: EntryType,
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
    pub level: usize,
    pub aggressor_side: Option<Side>,
}

impl Level2Message {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        exchange: &str,
        time: Timestamp,
        update_action: UpdateAction,
        entry_type: EntryType,
        price: Price,
        quantity: Quantity,
        order_count: u32,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            time,
            update_action,
            entry_type,
            price,
            quantity,
            order_count,
            level: 0,
            aggressor_side: None,
        }
    }

    pub fn trade(
        symbol: &str,
        exchange: &str,
        time: Timestamp,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self::new(
            symbol,
            exchange,
            time,
            UpdateAction::New,
            EntryType::Trade,
            price,
            quantity,
            0,
        )
    }

    pub fn with_aggressor(mut self, side: Side) -> Self {
        self.aggressor_side = Some(side);
        self
    }
}

/// All refresh entries received for one symbol in a single exchange packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level2Packet {
    pub symbol: String,
    pub exchange: String,
    pub time: Timestamp,
    pub messages: Vec<Level2Message>,
}

impl Level2Packet {
    pub fn new(symbol: &str, exchange: &str, time: Timestamp) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            time,
            messages: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        update_action: UpdateAction,
        entry_type: EntryType,
        price: Price,
        quantity: Quantity,
        order_count: u32,
    ) -> &mut Self {
        self.messages.push(Level2Message::new(
            &self.symbol,
            &self.exchange,
            self.time,
            update_action,
            entry_type,
            price,
            quantity,
            order_count,
        ));
        self
    }

    pub fn push_trade(&mut self, price: Price, quantity: Quantity) -> &mut Self {
        self.messages.push(Level2Message::trade(
            &self.symbol,
            &self.exchange,
            self.time,
            price,
            quantity,
        ));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrder {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub quantity: Quantity,
    pub time_in_force: TimeInForce,
    /// Pre-determined execution price, bypasses the book when set
    pub fill_price: Option<Price>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub time_in_force: TimeInForce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopOrder {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub quantity: Quantity,
    pub stop_price: Price,
    pub time_in_force: TimeInForce,
}

/// Trader order as submitted to an execution engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Order {
    Market(MarketOrder),
    Limit(LimitOrder),
    Stop(StopOrder),
}

impl Order {
    pub fn new_market(symbol: &str, side: Side, quantity: Quantity) -> Self {
        Order::Market(MarketOrder {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            time_in_force: TimeInForce::Day,
            fill_price: None,
        })
    }

    pub fn new_limit(symbol: &str, side: Side, price: Price, quantity: Quantity) -> Self {
        Order::Limit(LimitOrder {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            time_in_force: TimeInForce::Gtc,
        })
    }

    pub fn new_stop(symbol: &str, side: Side, stop_price: Price, quantity: Quantity) -> Self {
        Order::Stop(StopOrder {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            stop_price,
            time_in_force: TimeInForce::Gtc,
        })
    }

    pub fn id(&self) -> OrderId {
        match self {
            Order::Market(o) => o.id,
            Order::Limit(o) => o.id,
            Order::Stop(o) => o.id,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Order::Market(o) => &o.symbol,
            Order::Limit(o) => &o.symbol,
            Order::Stop(o) => &o.symbol,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Order::Market(o) => o.side,
            Order::Limit(o) => o.side,
            Order::Stop(o) => o.side,
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            Order::Market(o) => o.quantity,
            Order::Limit(o) => o.quantity,
            Order::Stop(o) => o.quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// Order status change reported to collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub time: Timestamp,
    pub price: Option<Price>,
    pub quantity: Option<Quantity>,
    pub reason: Option<String>,
}

impl OrderStatusEvent {
    fn bare(order_id: OrderId, status: OrderStatus, time: Timestamp) -> Self {
        Self {
            order_id,
            status,
            time,
            price: None,
            quantity: None,
            reason: None,
        }
    }

    pub fn pending_new(order_id: OrderId, time: Timestamp) -> Self {
        Self::bare(order_id, OrderStatus::PendingNew, time)
    }

    pub fn new_order(order_id: OrderId, time: Timestamp) -> Self {
        Self::bare(order_id, OrderStatus::New, time)
    }

    pub fn filled(order_id: OrderId, time: Timestamp, price: Price, quantity: Quantity) -> Self {
        Self {
            price: Some(price),
            quantity: Some(quantity),
            ..Self::bare(order_id, OrderStatus::Filled, time)
        }
    }

    pub fn partially_filled(
        order_id: OrderId,
        time: Timestamp,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            price: Some(price),
            quantity: Some(quantity),
            ..Self::bare(order_id, OrderStatus::PartiallyFilled, time)
        }
    }

    pub fn cancelled(order_id: OrderId, time: Timestamp, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::bare(order_id, OrderStatus::Canceled, time)
        }
    }

    pub fn rejected(order_id: OrderId, time: Timestamp, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::bare(order_id, OrderStatus::Rejected, time)
        }
    }

    pub fn is_fill(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::PartiallyFilled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevelInfo {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub exchange: String,
    pub timestamp: Option<Timestamp>,
    pub bids: Vec<PriceLevelInfo>,
    pub asks: Vec<PriceLevelInfo>,
}
