//! Built-in spot catalogue used when the host supplies no instrument source.

use super::{Instrument, InstrumentType};

fn spot(
    symbol: &str,
    base: &str,
    quote: &str,
    price_increment: &str,
    quantity_increment: &str,
    min_quantity: &str,
    max_quantity: &str,
    min_notional: &str,
    price_precision: u32,
    quantity_precision: u32,
) -> Instrument {
    Instrument {
        symbol: symbol.to_string(),
        instrument_type: InstrumentType::Spot,
        base_currency: base.to_string(),
        quote_currency: quote.to_string(),
        venue: "fake".to_string(),
        price_increment: price_increment.to_string(),
        quantity_increment: quantity_increment.to_string(),
        min_quantity: min_quantity.to_string(),
        max_quantity: max_quantity.to_string(),
        min_notional: min_notional.to_string(),
        price_precision,
        quantity_precision,
        notional_precision: 8,
    }
}

/// The default instrument set: three liquid USDT spot pairs.
pub fn default_instruments() -> Vec<Instrument> {
    vec![
        spot(
            "BTC-USDT", "BTC", "USDT", "0.01", "0.0001", "0.0001", "1000", "5", 2, 4,
        ),
        spot(
            "ETH-USDT", "ETH", "USDT", "0.01", "0.001", "0.001", "5000", "5", 2, 3,
        ),
        spot(
            "SOL-USDT", "SOL", "USDT", "0.001", "0.01", "0.01", "50000", "1", 3, 2,
        ),
    ]
}
