//! Lazily-created per-instrument market state.

use super::book::TickBook;
use super::depth::{ActiveOrder, LevelChange};
use super::kline::KlineTrack;
use crate::instrument::CatalogueEntry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Everything the engine knows about one instrument's market.
///
/// Exclusively owned by its instrument lock; creation happens on first
/// reference and the state lives until shutdown.
#[derive(Debug)]
pub struct InstrumentState {
    /// Price the walk falls back to when a sample goes non-positive
    pub base_price: f64,
    /// Last traded (or sampled) price
    pub last_price: f64,
    /// 24h volume accumulator
    pub volume_24h: f64,
    /// The two-sided tick book
    pub book: TickBook,
    /// Exchange order id → resting order; only orders with open quantity
    pub orders: HashMap<String, Arc<ActiveOrder>>,
    /// Kline aggregation windows
    pub klines: KlineTrack,
    /// Level changes accumulated since the last delta emission
    pub pending_diff: Vec<LevelChange>,
}

/// Acquire a state lock, recovering from poisoning (state stays usable
/// even if a holder panicked).
pub fn lock_state(state: &Mutex<InstrumentState>) -> MutexGuard<'_, InstrumentState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The table of per-instrument states, keyed by normalized symbol.
pub struct MarketState {
    states: DashMap<String, Arc<Mutex<InstrumentState>>>,
    base_prices: HashMap<String, f64>,
    fallback_base_price: f64,
    book_levels: usize,
}

impl MarketState {
    /// Create an empty table.
    pub fn new(
        base_prices: HashMap<String, f64>,
        fallback_base_price: f64,
        book_levels: usize,
    ) -> Self {
        Self {
            states: DashMap::new(),
            base_prices,
            fallback_base_price,
            book_levels,
        }
    }

    /// Fetch the state for an instrument, creating and seeding it on first
    /// reference. The returned `Arc` is cloned out of the table so the
    /// instrument lock is never taken while a table shard is held.
    pub fn state_for(&self, entry: &CatalogueEntry) -> Arc<Mutex<InstrumentState>> {
        let symbol = &entry.instrument.symbol;
        if let Some(existing) = self.states.get(symbol) {
            return existing.clone();
        }
        let created = self
            .states
            .entry(symbol.clone())
            .or_insert_with(|| {
                let base_price = self
                    .base_prices
                    .get(symbol)
                    .copied()
                    .unwrap_or(self.fallback_base_price);
                let mut book = TickBook::new();
                book.seed(&entry.constraints, base_price, self.book_levels);
                debug!(symbol = %symbol, base_price, "created instrument state");
                Arc::new(Mutex::new(InstrumentState {
                    base_price,
                    last_price: base_price,
                    volume_24h: 0.0,
                    book,
                    orders: HashMap::new(),
                    klines: KlineTrack::new(),
                    pending_diff: Vec::new(),
                }))
            })
            .clone();
        created
    }

    /// Fetch an existing state without creating one.
    pub fn get(&self, symbol: &str) -> Option<Arc<Mutex<InstrumentState>>> {
        self.states.get(symbol).map(|s| s.clone())
    }

    /// Drop every state. Only the shutdown path calls this.
    pub fn clear(&self) {
        self.states.clear();
    }
}
