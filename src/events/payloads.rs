//! Typed event payloads.
//!
//! Numeric fields travel as decimal strings formatted at the owning
//! instrument's precision, mirroring the canonical wire schema. Balances
//! format with 8 decimals.

use crate::instrument::Instrument;
use crate::market::depth::{OrderState, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The payload carried by an [`super::Event`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Blank payload, only seen on freshly-borrowed pool objects
    Empty,
    /// Ticker summary
    Ticker(TickerPayload),
    /// Executed trade
    Trade(TradePayload),
    /// Book snapshot or delta
    Book(BookPayload),
    /// Finalized kline window
    Kline(KlinePayload),
    /// Balance change
    Balance(BalancePayload),
    /// Changed or added instrument
    Instrument(Box<Instrument>),
    /// Order lifecycle report
    Exec(ExecReportPayload),
}

/// Last price and top of book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerPayload {
    /// Last traded or sampled price
    pub last_price: String,
    /// Best bid, falling back to `last × 0.999` on an empty side
    pub best_bid: String,
    /// Best ask, falling back to `last × 1.001` on an empty side
    pub best_ask: String,
    /// 24h volume accumulator
    pub volume_24h: String,
    /// Accumulator timestamp
    pub timestamp: DateTime<Utc>,
}

/// A single executed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePayload {
    /// Venue-assigned trade id
    pub trade_id: String,
    /// Execution price (average over the walk)
    pub price: String,
    /// Executed quantity
    pub quantity: String,
    /// Aggressor side
    pub side: Side,
    /// Execution timestamp
    pub timestamp: DateTime<Utc>,
}

/// Whether a book payload is a full snapshot or a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookPayloadKind {
    /// Full top-N snapshot
    Snapshot,
    /// Changed levels since the previous emission
    Delta,
}

/// One price level. In deltas, a zero quantity removes the level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    /// Level price
    pub price: String,
    /// Total quantity at the level (synthetic + user)
    pub quantity: String,
}

/// Order book snapshot or delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookPayload {
    /// Snapshot or delta
    pub kind: BookPayloadKind,
    /// Bid levels, best first
    pub bids: Vec<BookLevel>,
    /// Ask levels, best first
    pub asks: Vec<BookLevel>,
    /// Opaque checksum over the event identity, not the payload
    pub checksum: u32,
    /// Build timestamp
    pub timestamp: DateTime<Utc>,
}

/// A finalized OHLCV window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlinePayload {
    /// Window start
    pub open_time: DateTime<Utc>,
    /// Window end (`open_time + interval`)
    pub close_time: DateTime<Utc>,
    /// Open price
    pub open: String,
    /// Highest price
    pub high: String,
    /// Lowest price
    pub low: String,
    /// Close price
    pub close: String,
    /// Accumulated volume
    pub volume: String,
    /// Window length in milliseconds
    pub interval_ms: u64,
}

/// A balance change for one currency. Formats with 8 decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancePayload {
    /// Currency code
    pub currency: String,
    /// Total balance
    pub total: String,
    /// Available balance, `≤ total`
    pub available: String,
    /// Mutation timestamp
    pub timestamp: DateTime<Utc>,
}

/// Order lifecycle report.
///
/// Side and type echo the canonical request strings so rejected orders with
/// unparsable fields still round-trip what the caller sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecReportPayload {
    /// Caller-supplied order id
    pub client_order_id: String,
    /// Venue-assigned id; empty when rejected before acceptance
    pub exchange_order_id: String,
    /// Lifecycle state
    pub state: OrderState,
    /// Canonical side string
    pub side: String,
    /// Canonical order-type string
    pub order_type: String,
    /// Time-in-force in effect
    pub time_in_force: String,
    /// Limit price, or average fill price for market orders after a fill
    pub price: String,
    /// Requested quantity
    pub quantity: String,
    /// Filled quantity
    pub filled: String,
    /// Open quantity
    pub remaining: String,
    /// Volume-weighted average fill price
    pub avg_fill_price: String,
    /// Report timestamp
    pub timestamp: DateTime<Utc>,
    /// Why the order was rejected or cancelled, when it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

/// Format a balance figure with the fixed 8-decimal convention.
pub fn format_balance(value: f64) -> String {
    format!("{value:.8}")
}
