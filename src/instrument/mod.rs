//! Instrument schema, derived trading constraints, and the validated
//! catalogue.

mod catalogue;
mod constraints;
mod defaults;

pub use catalogue::{CatalogueEntry, InstrumentCatalogue, InstrumentSource, StaticInstrumentSource};
pub use constraints::InstrumentConstraints;
pub use defaults::default_instruments;

use serde::{Deserialize, Serialize};

/// Instrument classification. The simulator only trades spot pairs;
/// anything else is dropped during catalogue validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    /// Spot pair (base/quote)
    Spot,
    /// Perpetual swap
    Perpetual,
    /// Dated future
    Future,
}

/// A tradable instrument as described by the canonical catalogue schema.
///
/// Numeric limits arrive as decimal strings, mirroring the upstream schema;
/// [`InstrumentConstraints`] holds the parsed, validated form the engine
/// actually works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Native symbol, e.g. `BTC-USDT`
    pub symbol: String,
    /// Instrument classification; must be [`InstrumentType::Spot`]
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    /// Base currency code
    pub base_currency: String,
    /// Quote currency code
    pub quote_currency: String,
    /// Venue label
    pub venue: String,
    /// Minimum price increment, positive decimal
    pub price_increment: String,
    /// Minimum quantity increment, positive decimal
    pub quantity_increment: String,
    /// Smallest accepted order quantity
    pub min_quantity: String,
    /// Largest accepted order quantity
    pub max_quantity: String,
    /// Smallest accepted order notional (`0` disables the check)
    pub min_notional: String,
    /// Decimal places used when formatting prices
    pub price_precision: u32,
    /// Decimal places used when formatting quantities
    pub quantity_precision: u32,
    /// Decimal places used when formatting notionals
    pub notional_precision: u32,
}
