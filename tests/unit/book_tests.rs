//! Tick-book behaviour: seeding, matching walks, marketability, mutation.

use std::sync::Arc;
use venuesim::market::model::SharedRng;
use venuesim::market::QTY_EPSILON;
use venuesim::prelude::*;
use venuesim::{ActiveOrder, TickBook};

fn btc_constraints() -> InstrumentConstraints {
    let instrument = default_instruments()
        .into_iter()
        .find(|i| i.symbol == "BTC-USDT")
        .unwrap();
    InstrumentConstraints::derive(&instrument).unwrap()
}

fn seeded_book(constraints: &InstrumentConstraints) -> TickBook {
    let mut book = TickBook::new();
    book.seed(constraints, 50_000.0, 10);
    book
}

fn resting_order(
    constraints: &InstrumentConstraints,
    id: &str,
    side: Side,
    price: f64,
    quantity: f64,
) -> Arc<ActiveOrder> {
    Arc::new(ActiveOrder::new(
        format!("client-{id}"),
        format!("BTCUSDT-{id}"),
        "BTC-USDT".to_string(),
        side,
        OrderKind::Limit,
        TimeInForce::Gtc,
        price,
        constraints.tick_for_price(price),
        quantity,
        chrono::Utc::now(),
    ))
}

#[test]
fn test_seed_populates_both_sides_around_last() {
    let constraints = btc_constraints();
    let book = seeded_book(&constraints);
    assert_eq!(book.level_count(Side::Buy), 10);
    assert_eq!(book.level_count(Side::Sell), 10);
    let bid = book.best_bid(&constraints).unwrap();
    let ask = book.best_ask(&constraints).unwrap();
    assert!(bid < 50_000.0);
    assert!(ask > 50_000.0);
    assert!((ask - bid - 2.0 * constraints.price_increment).abs() < 1e-9);
}

#[test]
fn test_snapshot_is_best_first_and_truncated() {
    let constraints = btc_constraints();
    let book = seeded_book(&constraints);
    let bids = book.snapshot(&constraints, Side::Buy, 5);
    let asks = book.snapshot(&constraints, Side::Sell, 5);
    assert_eq!(bids.len(), 5);
    assert_eq!(asks.len(), 5);
    assert!(bids.windows(2).all(|w| w[0].0 > w[1].0), "bids descend");
    assert!(asks.windows(2).all(|w| w[0].0 < w[1].0), "asks ascend");
    assert!(bids.iter().all(|(_, q)| *q > 0.0));
}

#[test]
fn test_marketable_boundaries() {
    let constraints = btc_constraints();
    let book = seeded_book(&constraints);
    let ask = book.best_ask(&constraints).unwrap();
    let bid = book.best_bid(&constraints).unwrap();

    assert!(book.is_marketable(&constraints, Side::Buy, ask));
    assert!(book.is_marketable(&constraints, Side::Buy, ask + 1.0));
    assert!(!book.is_marketable(&constraints, Side::Buy, ask - constraints.price_increment));

    assert!(book.is_marketable(&constraints, Side::Sell, bid));
    assert!(book.is_marketable(&constraints, Side::Sell, bid - 1.0));
    assert!(!book.is_marketable(&constraints, Side::Sell, bid + constraints.price_increment));
}

#[test]
fn test_available_liquidity_respects_limit() {
    let constraints = btc_constraints();
    let book = seeded_book(&constraints);
    let ask = book.best_ask(&constraints).unwrap();

    let unconstrained = book.available_liquidity(&constraints, Side::Buy, 0.0);
    let top_only = book.available_liquidity(&constraints, Side::Buy, ask);
    assert!(unconstrained > top_only);
    // Top ask level carries the smallest seed quantity.
    assert!((top_only - 0.11).abs() < 1e-9);

    let below_book = book.available_liquidity(&constraints, Side::Buy, ask - 1.0);
    assert_eq!(below_book, 0.0);
}

#[test]
fn test_consume_bounds_and_average_price() {
    let constraints = btc_constraints();
    let mut book = seeded_book(&constraints);
    let best_before = book.best_ask(&constraints).unwrap();

    let outcome = book.consume_liquidity(&constraints, Side::Buy, 0.3, 0.0, chrono::Utc::now());
    assert!(outcome.filled <= 0.3 + QTY_EPSILON);
    assert!(outcome.filled > 0.0);

    // Average price sits between the best price before the walk and the
    // farthest price touched.
    let far = outcome
        .fills
        .iter()
        .map(|f| f.price)
        .fold(best_before, f64::max);
    assert!(outcome.avg_price >= best_before - 1e-9);
    assert!(outcome.avg_price <= far + 1e-9);

    // No consumed level may retain negative synthetic depth.
    for (_, quantity) in book.snapshot(&constraints, Side::Sell, usize::MAX) {
        assert!(quantity >= 0.0);
    }
}

#[test]
fn test_consume_stops_at_limit_price() {
    let constraints = btc_constraints();
    let mut book = seeded_book(&constraints);
    let ask = book.best_ask(&constraints).unwrap();

    // Limit exactly at the best ask: only that level may fill.
    let outcome = book.consume_liquidity(&constraints, Side::Buy, 10.0, ask, chrono::Utc::now());
    assert!((outcome.filled - 0.11).abs() < 1e-9);
    assert!((outcome.avg_price - ask).abs() < 1e-9);
}

#[test]
fn test_consume_prefers_user_fifo_then_synthetic() {
    let constraints = btc_constraints();
    let mut book = seeded_book(&constraints);
    let ask = book.best_ask(&constraints).unwrap();

    let first = resting_order(&constraints, "000001", Side::Sell, ask, 0.05);
    let second = resting_order(&constraints, "000002", Side::Sell, ask, 0.05);
    book.rest(first.clone());
    book.rest(second.clone());

    // 0.07 takes all of the first order, part of the second, no synthetic.
    let outcome = book.consume_liquidity(&constraints, Side::Buy, 0.07, ask, chrono::Utc::now());
    assert!((outcome.filled - 0.07).abs() < 1e-9);
    assert!(first.is_fully_filled());
    assert!((second.remaining() - 0.03).abs() < 1e-9);

    let maker_fills: Vec<_> = outcome.fills.iter().filter(|f| f.maker.is_some()).collect();
    assert_eq!(maker_fills.len(), 2);
    // Synthetic at the level is untouched while user orders remain.
    let tick = constraints.tick_for_price(ask);
    assert!(book.depth_at(Side::Sell, tick) > 0.11 - 1e-9);
}

#[test]
fn test_fully_consumed_levels_are_removed() {
    let constraints = btc_constraints();
    let mut book = seeded_book(&constraints);
    let ask = book.best_ask(&constraints).unwrap();

    let outcome = book.consume_liquidity(&constraints, Side::Buy, 0.11, ask, chrono::Utc::now());
    assert!((outcome.filled - 0.11).abs() < 1e-9);
    let next_ask = book.best_ask(&constraints).unwrap();
    assert!(next_ask > ask);
    assert_eq!(book.level_count(Side::Sell), 9);
}

#[test]
fn test_recenter_refills_consumed_side() {
    let constraints = btc_constraints();
    let mut book = seeded_book(&constraints);
    book.consume_liquidity(&constraints, Side::Buy, 1.0, 0.0, chrono::Utc::now());
    assert!(book.level_count(Side::Sell) < 10);

    let changes = book.recenter(&constraints, 50_000.0, 10);
    assert!(!changes.is_empty());
    assert_eq!(book.level_count(Side::Sell), 10);
    assert_eq!(book.level_count(Side::Buy), 10);
}

#[test]
fn test_mutate_keeps_book_populated_and_reports_changes() {
    let constraints = btc_constraints();
    let mut book = seeded_book(&constraints);
    let rng = SharedRng::new(Some(11));

    for _ in 0..50 {
        let changes = book.mutate(&rng, &constraints, 50_000.0, 10, 3);
        assert!(book.level_count(Side::Buy) >= 10);
        assert!(book.level_count(Side::Sell) >= 10);
        for change in &changes {
            assert!(change.quantity >= 0.0);
        }
    }
}

#[test]
fn test_rest_and_contains_order() {
    let constraints = btc_constraints();
    let mut book = seeded_book(&constraints);
    let order = resting_order(&constraints, "000009", Side::Buy, 49_000.0, 0.25);
    book.rest(order.clone());
    assert!(book.contains_order(Side::Buy, order.tick, &order.exchange_order_id));
    assert!(!book.contains_order(Side::Sell, order.tick, &order.exchange_order_id));
}
