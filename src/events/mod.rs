//! Canonical event model: event types, the pool-allocated event object,
//! typed payloads, and the sequencing emitter.

pub mod emitter;
pub mod payloads;
pub mod pool;

pub use emitter::EventEmitter;
pub use payloads::{
    BalancePayload, BookLevel, BookPayload, BookPayloadKind, EventPayload, ExecReportPayload,
    KlinePayload, TickerPayload, TradePayload,
};
pub use pool::EventPool;

use crate::error::VenueError;
use crate::utils::compact_symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal event types the simulator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Last price / best bid-ask summary
    Ticker,
    /// A single executed trade
    Trade,
    /// Order book snapshot or delta
    BookSnapshot,
    /// A finalized OHLCV window
    KlineSummary,
    /// A balance change for one currency
    BalanceUpdate,
    /// A changed or added catalogue instrument
    InstrumentUpdate,
    /// Order lifecycle report
    ExecReport,
}

impl EventType {
    /// Canonical string form, as used inside event ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Ticker => "TICKER",
            EventType::Trade => "TRADE",
            EventType::BookSnapshot => "BOOK_SNAPSHOT",
            EventType::KlineSummary => "KLINE_SUMMARY",
            EventType::BalanceUpdate => "BALANCE_UPDATE",
            EventType::InstrumentUpdate => "INSTRUMENT_UPDATE",
            EventType::ExecReport => "EXEC_REPORT",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a canonical route type onto the internal event type.
///
/// # Errors
/// [`VenueError::UnsupportedRouteType`] for unknown or empty types.
pub fn canonical_route_type(raw: &str) -> Result<EventType, VenueError> {
    match raw.trim().to_uppercase().as_str() {
        "ORDERBOOK.SNAPSHOT" | "ORDERBOOK.DELTA" | "ORDERBOOK.UPDATE" => Ok(EventType::BookSnapshot),
        "TRADE" => Ok(EventType::Trade),
        "TICKER" => Ok(EventType::Ticker),
        "EXECUTION.REPORT" => Ok(EventType::ExecReport),
        "KLINE" | "KLINE.SUMMARY" => Ok(EventType::KlineSummary),
        "ACCOUNT.BALANCE" => Ok(EventType::BalanceUpdate),
        _ => Err(VenueError::UnsupportedRouteType(raw.to_string())),
    }
}

/// A pool-allocated canonical event.
///
/// Owned by the emitting path until it lands on the events channel; from
/// then on the consumer owns it and must hand it back to the pool.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// `{provider}:{symbol-no-dash}:{type}:{sequence}`
    pub id: String,
    /// Emitting provider's display name
    pub provider: String,
    /// Native symbol (or currency for balance events)
    pub symbol: String,
    /// What the payload carries
    pub event_type: EventType,
    /// Monotonic per-(type, symbol) sequence, from 1
    pub sequence: u64,
    /// When the producing path started building the payload
    pub ingest_at: DateTime<Utc>,
    /// When the event was handed to the channel
    pub emit_at: DateTime<Utc>,
    /// The typed payload
    pub payload: EventPayload,
}

impl Event {
    /// A blank event, as pools hand them out before population.
    pub fn empty() -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id: String::new(),
            provider: String::new(),
            symbol: String::new(),
            event_type: EventType::Ticker,
            sequence: 0,
            ingest_at: epoch,
            emit_at: epoch,
            payload: EventPayload::Empty,
        }
    }

    /// Clear all fields so the object can go back to a pool.
    pub fn reset(&mut self) {
        self.id.clear();
        self.provider.clear();
        self.symbol.clear();
        self.event_type = EventType::Ticker;
        self.sequence = 0;
        self.ingest_at = DateTime::<Utc>::UNIX_EPOCH;
        self.emit_at = DateTime::<Utc>::UNIX_EPOCH;
        self.payload = EventPayload::Empty;
    }

    /// Compose the canonical event id.
    pub fn compose_id(provider: &str, symbol: &str, event_type: EventType, sequence: u64) -> String {
        format!(
            "{provider}:{}:{}:{sequence}",
            compact_symbol(symbol),
            event_type.as_str()
        )
    }
}
