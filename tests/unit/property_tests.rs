//! Property tests over the constraint arithmetic and the kline track.

use proptest::prelude::*;
use std::time::Duration;
use venuesim::market::{KlineTrack, QTY_EPSILON};
use venuesim::prelude::*;

fn btc_constraints() -> InstrumentConstraints {
    let instrument = default_instruments()
        .into_iter()
        .find(|i| i.symbol == "BTC-USDT")
        .unwrap();
    InstrumentConstraints::derive(&instrument).unwrap()
}

proptest! {
    #[test]
    fn prop_normalize_quantity_idempotent(quantity in 0.0001f64..1000.0) {
        let constraints = btc_constraints();
        let once = constraints.normalize_quantity(quantity);
        let twice = constraints.normalize_quantity(once);
        prop_assert!((once - twice).abs() <= QTY_EPSILON);
    }

    #[test]
    fn prop_normalize_price_idempotent(price in 0.01f64..1_000_000.0) {
        let constraints = btc_constraints();
        let once = constraints.normalize_price(price);
        let twice = constraints.normalize_price(once);
        prop_assert!((once - twice).abs() <= 1e-6);
    }

    #[test]
    fn prop_tick_round_trip_within_half_increment(price in 0.01f64..1_000_000.0) {
        let constraints = btc_constraints();
        let back = constraints.price_for_tick(constraints.tick_for_price(price));
        prop_assert!(
            (back - price).abs() <= constraints.price_increment / 2.0 + 1e-9,
            "{price} round-tripped to {back}"
        );
    }

    #[test]
    fn prop_valid_quantity_accepts_grid_points(steps in 1u64..1_000_000) {
        let constraints = btc_constraints();
        let quantity = steps as f64 * constraints.quantity_increment;
        if quantity <= constraints.max_quantity {
            prop_assert!(constraints.valid_quantity(quantity));
        }
    }

    #[test]
    fn prop_kline_ohlc_ordering(
        prices in prop::collection::vec(0.01f64..10_000.0, 1..40),
        offsets in prop::collection::vec(0i64..30_000, 1..40),
    ) {
        let interval = Duration::from_secs(2);
        let mut track = KlineTrack::new();
        let mut ts_ms: i64 = 0;
        for (price, offset) in prices.iter().zip(offsets.iter()) {
            ts_ms += offset;
            let ts = chrono::DateTime::from_timestamp_millis(ts_ms).unwrap();
            track.update(ts, *price, 1.0, interval);
            let window = track.current().unwrap();
            prop_assert!(window.low <= window.open && window.open <= window.high);
            prop_assert!(window.low <= window.close && window.close <= window.high);
            prop_assert!(window.close_time > window.open_time);
        }

        // Finalize drains in open-time order and is idempotent.
        let now = chrono::DateTime::from_timestamp_millis(ts_ms + 60_000).unwrap();
        let drained = track.finalize(now, interval);
        prop_assert!(drained.windows(2).all(|w| w[0].open_time < w[1].open_time));
        prop_assert!(track.finalize(now, interval).is_empty());
    }
}
