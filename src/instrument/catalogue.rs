//! Validated instrument catalogue with atomic swap and change diffing.

use super::constraints::InstrumentConstraints;
use super::Instrument;
use crate::error::VenueError;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, warn};

/// A validated catalogue entry: the cleaned instrument plus its derived
/// constraints.
#[derive(Debug, Clone)]
pub struct CatalogueEntry {
    /// The instrument as accepted into the catalogue (symbol normalized)
    pub instrument: Instrument,
    /// Parsed trading constraints
    pub constraints: InstrumentConstraints,
}

/// Supplies instrument definitions to the periodic catalogue refresher.
///
/// The simulator performs no real I/O, so the seam is synchronous; hosts
/// that assemble catalogues elsewhere can capture whatever state they need
/// in the implementation.
pub trait InstrumentSource: Send + Sync {
    /// Produce the current instrument set.
    ///
    /// # Errors
    /// Any failure is forwarded to the error channel; the catalogue keeps
    /// its previous contents.
    fn fetch(&self) -> Result<Vec<Instrument>, VenueError>;
}

/// An [`InstrumentSource`] returning a fixed list.
pub struct StaticInstrumentSource(pub Vec<Instrument>);

impl InstrumentSource for StaticInstrumentSource {
    fn fetch(&self) -> Result<Vec<Instrument>, VenueError> {
        Ok(self.0.clone())
    }
}

struct Inner {
    by_symbol: HashMap<String, CatalogueEntry>,
    /// Native symbols in catalogue order, for deterministic iteration
    symbols: Vec<String>,
}

/// Symbol-keyed catalogue of validated instruments.
///
/// Writers only exist in [`InstrumentCatalogue::set_supported`]; routing and
/// order resolution take the read side. The catalogue never silently goes
/// empty: a swap that would leave no valid instruments retains the previous
/// set.
pub struct InstrumentCatalogue {
    inner: RwLock<Inner>,
}

impl InstrumentCatalogue {
    /// Create an empty catalogue.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_symbol: HashMap::new(),
                symbols: Vec::new(),
            }),
        }
    }

    /// Normalize a raw symbol the way the catalogue keys are stored.
    pub fn normalize_symbol(raw: &str) -> String {
        raw.trim().to_uppercase()
    }

    /// Validate and install a new instrument set.
    ///
    /// Each instrument is cloned, its symbol normalized, and its schema
    /// validated; invalid entries are dropped with a warning. When nothing
    /// survives validation the previous set is retained and no change is
    /// reported. Otherwise the set is swapped atomically and the returned
    /// list holds every instrument that is new or differs from its previous
    /// definition, in catalogue order.
    pub fn set_supported(&self, list: Vec<Instrument>) -> Vec<Instrument> {
        let mut by_symbol = HashMap::new();
        let mut symbols = Vec::new();

        for raw in list {
            let mut instrument = raw.clone();
            instrument.symbol = Self::normalize_symbol(&instrument.symbol);
            match InstrumentConstraints::derive(&instrument) {
                Ok(constraints) => {
                    if by_symbol
                        .insert(
                            instrument.symbol.clone(),
                            CatalogueEntry {
                                instrument: instrument.clone(),
                                constraints,
                            },
                        )
                        .is_none()
                    {
                        symbols.push(instrument.symbol);
                    }
                }
                Err(err) => {
                    warn!(symbol = %raw.symbol, %err, "dropping invalid instrument");
                }
            }
        }

        if by_symbol.is_empty() {
            warn!("instrument set empty after validation, retaining previous catalogue");
            return Vec::new();
        }

        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut changed = Vec::new();
        for symbol in &symbols {
            let next = &by_symbol[symbol];
            match inner.by_symbol.get(symbol) {
                Some(previous) if previous.instrument == next.instrument => {}
                _ => changed.push(next.instrument.clone()),
            }
        }

        inner.by_symbol = by_symbol;
        inner.symbols = symbols;
        info!(
            instruments = inner.symbols.len(),
            changed = changed.len(),
            "catalogue updated"
        );
        changed
    }

    /// Look up an entry by already-normalized symbol.
    pub fn get(&self, symbol: &str) -> Option<CatalogueEntry> {
        self.read().by_symbol.get(symbol).cloned()
    }

    /// Normalize a raw symbol and look it up.
    pub fn resolve(&self, raw: &str) -> Option<CatalogueEntry> {
        self.get(&Self::normalize_symbol(raw))
    }

    /// Native symbols in catalogue order.
    pub fn symbols(&self) -> Vec<String> {
        self.read().symbols.clone()
    }

    /// Every catalogued instrument, in catalogue order.
    pub fn instruments(&self) -> Vec<Instrument> {
        let inner = self.read();
        inner
            .symbols
            .iter()
            .filter_map(|s| inner.by_symbol.get(s))
            .map(|e| e.instrument.clone())
            .collect()
    }

    /// Every currency referenced by the catalogue (bases then quotes,
    /// deduplicated, in catalogue order).
    pub fn currencies(&self) -> Vec<String> {
        let inner = self.read();
        let mut seen = Vec::new();
        for symbol in &inner.symbols {
            if let Some(entry) = inner.by_symbol.get(symbol) {
                for currency in [
                    &entry.instrument.base_currency,
                    &entry.instrument.quote_currency,
                ] {
                    if !seen.contains(currency) {
                        seen.push(currency.clone());
                    }
                }
            }
        }
        seen
    }

    /// Whether the catalogue holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.read().symbols.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for InstrumentCatalogue {
    fn default() -> Self {
        Self::new()
    }
}
