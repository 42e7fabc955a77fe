//! Tick and lot arithmetic derived from a validated instrument.

use super::{Instrument, InstrumentType};
use crate::error::VenueError;
use crate::market::depth::PriceTick;

/// Tolerance for increment-snap and notional comparisons.
const EPSILON: f64 = 1e-9;

/// Parsed trading constraints for one instrument.
///
/// Prices are only ever keyed by integer ticks (`price = tick ×
/// price_increment`), which keeps the book free of float-equality bugs.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConstraints {
    /// Minimum price increment, > 0
    pub price_increment: f64,
    /// Minimum quantity increment, > 0
    pub quantity_increment: f64,
    /// Smallest accepted quantity, ≥ `quantity_increment`
    pub min_quantity: f64,
    /// Largest accepted quantity
    pub max_quantity: f64,
    /// Smallest accepted notional; `0` disables the check
    pub min_notional: f64,
    /// Decimal places for price formatting
    pub price_precision: usize,
    /// Decimal places for quantity formatting
    pub quantity_precision: usize,
    /// Decimal places for notional formatting
    pub notional_precision: usize,
}

impl InstrumentConstraints {
    /// Derive constraints from an instrument, enforcing the schema
    /// invariants along the way.
    ///
    /// # Errors
    /// [`VenueError::InvalidInstrument`] when the instrument is not spot,
    /// a decimal field fails to parse, or an invariant
    /// (`price_increment > 0`, `quantity_increment > 0`,
    /// `min_quantity ≥ quantity_increment`, `max_quantity ≥ min_quantity`)
    /// does not hold.
    pub fn derive(instrument: &Instrument) -> Result<Self, VenueError> {
        let invalid = |message: &str| VenueError::InvalidInstrument {
            symbol: instrument.symbol.clone(),
            message: message.to_string(),
        };

        if instrument.instrument_type != InstrumentType::Spot {
            return Err(invalid("only spot instruments are supported"));
        }
        if instrument.base_currency.trim().is_empty()
            || instrument.quote_currency.trim().is_empty()
        {
            return Err(invalid("base and quote currencies are required"));
        }

        let price_increment = parse_decimal(instrument, "price_increment", &instrument.price_increment)?;
        let quantity_increment =
            parse_decimal(instrument, "quantity_increment", &instrument.quantity_increment)?;
        let min_quantity = parse_decimal(instrument, "min_quantity", &instrument.min_quantity)?;
        let max_quantity = parse_decimal(instrument, "max_quantity", &instrument.max_quantity)?;
        let min_notional = parse_decimal(instrument, "min_notional", &instrument.min_notional)?;

        if price_increment <= 0.0 {
            return Err(invalid("price_increment must be positive"));
        }
        if quantity_increment <= 0.0 {
            return Err(invalid("quantity_increment must be positive"));
        }
        if min_quantity + EPSILON < quantity_increment {
            return Err(invalid("min_quantity must be at least quantity_increment"));
        }
        if max_quantity + EPSILON < min_quantity {
            return Err(invalid("max_quantity must be at least min_quantity"));
        }
        if min_notional < 0.0 {
            return Err(invalid("min_notional must not be negative"));
        }

        Ok(Self {
            price_increment,
            quantity_increment,
            min_quantity,
            max_quantity,
            min_notional,
            price_precision: instrument.price_precision as usize,
            quantity_precision: instrument.quantity_precision as usize,
            notional_precision: instrument.notional_precision as usize,
        })
    }

    /// Integer tick index for a price: `round(price / price_increment)`.
    pub fn tick_for_price(&self, price: f64) -> PriceTick {
        (price / self.price_increment).round() as PriceTick
    }

    /// Price represented by a tick index.
    pub fn price_for_tick(&self, tick: PriceTick) -> f64 {
        tick as f64 * self.price_increment
    }

    /// Snap a price to the nearest increment.
    pub fn normalize_price(&self, price: f64) -> f64 {
        self.price_for_tick(self.tick_for_price(price))
    }

    /// Snap a quantity to the nearest increment.
    pub fn normalize_quantity(&self, quantity: f64) -> f64 {
        (quantity / self.quantity_increment).round() * self.quantity_increment
    }

    /// Whether a quantity is positive, inside `[min_quantity, max_quantity]`
    /// and on the increment grid (within tolerance).
    pub fn valid_quantity(&self, quantity: f64) -> bool {
        if quantity <= 0.0 {
            return false;
        }
        if quantity + EPSILON < self.min_quantity || quantity - EPSILON > self.max_quantity {
            return false;
        }
        (self.normalize_quantity(quantity) - quantity).abs() <= EPSILON
    }

    /// Whether `price × quantity` meets the minimum notional.
    /// A `min_notional` of zero disables the check.
    pub fn enforce_notional(&self, price: f64, quantity: f64) -> bool {
        self.min_notional <= 0.0 || price * quantity + EPSILON >= self.min_notional
    }

    /// Format a price at the instrument's price precision.
    pub fn format_price(&self, price: f64) -> String {
        format!("{:.*}", self.price_precision, price)
    }

    /// Format a quantity at the instrument's quantity precision.
    pub fn format_quantity(&self, quantity: f64) -> String {
        format!("{:.*}", self.quantity_precision, quantity)
    }
}

fn parse_decimal(instrument: &Instrument, field: &str, raw: &str) -> Result<f64, VenueError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| VenueError::InvalidInstrument {
            symbol: instrument.symbol.clone(),
            message: format!("{field} is not a valid decimal: {raw:?}"),
        })
}
