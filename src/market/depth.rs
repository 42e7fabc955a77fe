//! Book primitives: sides, time-in-force, tick indices, depth levels and
//! resting orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Signed index into the price increment grid. Book keys are always ticks,
/// never floats: `price = tick × price_increment`.
pub type PriceTick = i64;

/// Tolerance below which a quantity counts as zero.
pub const QTY_EPSILON: f64 = 1e-9;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    /// Bid side
    Buy,
    /// Ask side
    Sell,
}

impl Side {
    /// Parse a canonical side string; `None` for anything unrecognized.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }

    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported order types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Resting or marketable order with a limit price
    Limit,
    /// Immediate execution against available depth
    Market,
}

impl OrderKind {
    /// Parse a canonical order-type string; `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "LIMIT" => Some(OrderKind::Limit),
            "MARKET" => Some(OrderKind::Market),
            _ => None,
        }
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Limit => "LIMIT",
            OrderKind::Market => "MARKET",
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-in-force policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Good-till-cancelled: remainder rests on the book
    Gtc,
    /// Immediate-or-cancel: remainder is cancelled
    Ioc,
    /// Fill-or-kill: rejected unless fully fillable
    Fok,
    /// Rejected when the order would cross the book
    PostOnly,
}

impl TimeInForce {
    /// Parse a TIF token. `"IOC"`, `"FOK"` and the post-only spellings
    /// (`"POST"`, `"POST_ONLY"`, `"PO"`) map to their modes; anything else,
    /// including the empty string, defaults to GTC.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "IOC" => TimeInForce::Ioc,
            "FOK" => TimeInForce::Fok,
            "POST" | "POST_ONLY" | "PO" => TimeInForce::PostOnly,
            _ => TimeInForce::Gtc,
        }
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::PostOnly => "POST_ONLY",
        }
    }
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution-report lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Accepted by the venue, no fills yet
    Ack,
    /// Some quantity filled, remainder open or cancelled
    PartiallyFilled,
    /// Fully filled
    Filled,
    /// Cancelled (IOC/FOK remainder)
    Cancelled,
    /// Rejected during validation or venue checks
    Rejected,
}

impl OrderState {
    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Ack => "ACK",
            OrderState::PartiallyFilled => "PARTIALLY_FILLED",
            OrderState::Filled => "FILLED",
            OrderState::Cancelled => "CANCELLED",
            OrderState::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct FillProgress {
    remaining: f64,
    filled: f64,
    notional: f64,
    updated_at: DateTime<Utc>,
}

/// A live user order.
///
/// Shared between the depth level it rests on and the instrument's order
/// index; both are only reached under the instrument lock, so the inner
/// fill-progress mutex is uncontended and exists to give the shared value
/// interior mutability.
#[derive(Debug)]
pub struct ActiveOrder {
    /// Caller-supplied order id
    pub client_order_id: String,
    /// Venue-assigned id, `{SYMBOL}-{six digits}`
    pub exchange_order_id: String,
    /// Normalized instrument symbol
    pub symbol: String,
    /// Buy or Sell
    pub side: Side,
    /// Limit or Market
    pub kind: OrderKind,
    /// Time-in-force policy
    pub time_in_force: TimeInForce,
    /// Limit price; zero for market orders
    pub limit_price: f64,
    /// Tick of `limit_price` on the instrument grid
    pub tick: PriceTick,
    /// Total requested quantity
    pub quantity: f64,
    /// Submission timestamp
    pub created_at: DateTime<Utc>,
    progress: Mutex<FillProgress>,
}

impl ActiveOrder {
    /// Create a new order with the full quantity remaining.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_order_id: String,
        exchange_order_id: String,
        symbol: String,
        side: Side,
        kind: OrderKind,
        time_in_force: TimeInForce,
        limit_price: f64,
        tick: PriceTick,
        quantity: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            client_order_id,
            exchange_order_id,
            symbol,
            side,
            kind,
            time_in_force,
            limit_price,
            tick,
            quantity,
            created_at,
            progress: Mutex::new(FillProgress {
                remaining: quantity,
                filled: 0.0,
                notional: 0.0,
                updated_at: created_at,
            }),
        }
    }

    fn progress(&self) -> MutexGuard<'_, FillProgress> {
        match self.progress.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Quantity still open.
    pub fn remaining(&self) -> f64 {
        self.progress().remaining
    }

    /// Quantity filled so far.
    pub fn filled(&self) -> f64 {
        self.progress().filled
    }

    /// Σ `fill_qty × fill_price` over all fills.
    pub fn notional(&self) -> f64 {
        self.progress().notional
    }

    /// Volume-weighted average fill price, zero before any fill.
    pub fn avg_fill_price(&self) -> f64 {
        let progress = self.progress();
        if progress.filled > QTY_EPSILON {
            progress.notional / progress.filled
        } else {
            0.0
        }
    }

    /// Last update timestamp.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.progress().updated_at
    }

    /// Record a fill against this order. Remaining never goes below zero.
    pub fn apply_fill(&self, quantity: f64, price: f64, ts: DateTime<Utc>) {
        let mut progress = self.progress();
        let take = quantity.min(progress.remaining).max(0.0);
        progress.remaining -= take;
        if progress.remaining < QTY_EPSILON {
            progress.remaining = 0.0;
        }
        progress.filled += take;
        progress.notional += take * price;
        progress.updated_at = ts;
    }

    /// Whether the order has no open quantity left.
    pub fn is_fully_filled(&self) -> bool {
        self.progress().remaining <= QTY_EPSILON
    }
}

/// Liquidity available at one price tick.
///
/// House (`synthetic`) liquidity and user orders are kept separate so
/// matching can consume user FIFO first, then synthetic; they are never
/// collapsed into one quantity.
#[derive(Debug, Default)]
pub struct BookDepth {
    /// House-provided liquidity, non-negative
    pub synthetic: f64,
    /// User orders in FIFO insertion order
    pub orders: Vec<Arc<ActiveOrder>>,
}

impl BookDepth {
    /// Depth with only synthetic liquidity.
    pub fn synthetic(quantity: f64) -> Self {
        Self {
            synthetic: quantity,
            orders: Vec::new(),
        }
    }

    /// Synthetic plus the open quantity of every resting user order.
    pub fn total(&self) -> f64 {
        self.synthetic + self.orders.iter().map(|o| o.remaining()).sum::<f64>()
    }

    /// A level is dead when synthetic is gone and no user order rests on it.
    pub fn is_empty(&self) -> bool {
        self.synthetic <= QTY_EPSILON && self.orders.is_empty()
    }
}

/// One fill produced by a liquidity walk. `maker` is `None` when the fill
/// consumed synthetic (house) depth.
#[derive(Debug, Clone)]
pub struct Fill {
    /// Execution price
    pub price: f64,
    /// Executed quantity
    pub quantity: f64,
    /// The resting user order hit, if any
    pub maker: Option<Arc<ActiveOrder>>,
}

/// Result of a liquidity walk.
#[derive(Debug, Clone, Default)]
pub struct ConsumeOutcome {
    /// Volume-weighted average fill price, zero when nothing filled
    pub avg_price: f64,
    /// Total filled quantity
    pub filled: f64,
    /// Individual fills in execution order
    pub fills: Vec<Fill>,
}

/// A single level change produced by a book mutation, used for delta
/// emissions. `quantity` is the new total at the tick; zero means removed.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelChange {
    /// Which side the level lives on
    pub side: Side,
    /// The changed tick
    pub tick: PriceTick,
    /// New total quantity at the tick
    pub quantity: f64,
}
