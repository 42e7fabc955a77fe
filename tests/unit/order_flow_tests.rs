//! Order submission scenarios: TIF semantics, report ordering, rejections,
//! resting-order bookkeeping.

use crate::helpers::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use venuesim::market::state::lock_state;
use venuesim::prelude::*;
use venuesim::VenueBehaviourParams;

fn ask_side_total(instance: &VenueSimulator) -> f64 {
    let engine = instance.engine();
    let entry = engine.catalogue().get("BTC-USDT").unwrap();
    let state = engine.market().state_for(&entry);
    let guard = lock_state(&state);
    guard
        .book
        .snapshot(&entry.constraints, Side::Sell, usize::MAX)
        .iter()
        .map(|(_, q)| q)
        .sum()
}

fn best_ask(instance: &VenueSimulator) -> f64 {
    let engine = instance.engine();
    let entry = engine.catalogue().get("BTC-USDT").unwrap();
    let state = engine.market().state_for(&entry);
    let guard = lock_state(&state);
    guard.book.best_ask(&entry.constraints).unwrap()
}

#[tokio::test]
async fn test_post_only_crossing_is_rejected() {
    let (instance, mut events) = started_instance();
    let ctx = CancellationToken::new();

    let crossing_price = best_ask(&instance);
    let request = limit_order("BUY", "0.5", &format!("{crossing_price:.2}"), "PO");
    instance.submit_order(&ctx, request).await.unwrap();

    let report = next_exec_report(&mut events).await;
    assert_eq!(report.state, OrderState::Rejected);
    assert_eq!(
        report.reject_reason.as_deref(),
        Some("post-only order would cross the book")
    );

    // Exactly one report: nothing else follows a pre-ACK rejection.
    let rest = drain_for(&mut events, Duration::from_millis(100)).await;
    assert!(rest.is_empty(), "unexpected trailing events: {rest:?}");
    instance.shutdown().await;
}

#[tokio::test]
async fn test_fok_insufficient_liquidity_is_rejected() {
    let (instance, mut events) = started_instance();
    let ctx = CancellationToken::new();

    let available = ask_side_total(&instance);
    assert!(available < 100.0);

    instance
        .submit_order(&ctx, market_order("BUY", "100", "FOK"))
        .await
        .unwrap();

    let report = next_exec_report(&mut events).await;
    assert_eq!(report.state, OrderState::Rejected);
    assert_eq!(
        report.reject_reason.as_deref(),
        Some("FOK insufficient liquidity")
    );

    let rest = drain_for(&mut events, Duration::from_millis(100)).await;
    assert!(rest.is_empty());
    instance.shutdown().await;
}

#[tokio::test]
async fn test_ioc_partial_fill_then_cancel() {
    let (instance, mut events) = started_instance();
    let ctx = CancellationToken::new();

    let available = ask_side_total(&instance);
    assert!(available > 0.0 && available < 5.0);

    instance
        .submit_order(&ctx, market_order("BUY", "5", "IOC"))
        .await
        .unwrap();

    let ack = next_exec_report(&mut events).await;
    assert_eq!(ack.state, OrderState::Ack);
    assert!(!ack.exchange_order_id.is_empty());

    let fill = next_exec_report(&mut events).await;
    assert_eq!(fill.state, OrderState::PartiallyFilled);
    let filled: f64 = fill.filled.parse().unwrap();
    assert!((filled - available).abs() < 1e-3, "filled {filled}, book held {available}");
    let avg: f64 = fill.avg_fill_price.parse().unwrap();
    assert!(avg > 0.0);

    let cancel = next_exec_report(&mut events).await;
    assert_eq!(cancel.state, OrderState::Cancelled);
    assert_eq!(cancel.reject_reason.as_deref(), Some("IOC remainder cancelled"));

    // No resting order may remain for this submission.
    let engine = instance.engine();
    let entry = engine.catalogue().get("BTC-USDT").unwrap();
    let state = engine.market().state_for(&entry);
    assert!(lock_state(&state).orders.is_empty());

    instance.shutdown().await;
}

#[tokio::test]
async fn test_fills_settle_into_the_ledger() {
    let (instance, mut events) = started_instance();
    let ctx = CancellationToken::new();

    instance
        .submit_order(&ctx, market_order("BUY", "0.1", "IOC"))
        .await
        .unwrap();

    let _ack = next_exec_report(&mut events).await;
    let fill = next_exec_report(&mut events).await;
    assert_eq!(fill.state, OrderState::Filled);

    // One balance update per touched currency, after the reports.
    let balance_event = next_event_of(&mut events, EventType::BalanceUpdate).await;
    match &balance_event.payload {
        EventPayload::Balance(balance) => {
            let total: f64 = balance.total.parse().unwrap();
            let available: f64 = balance.available.parse().unwrap();
            assert!(total >= 0.0);
            assert!(available <= total + 1e-9);
        }
        other => panic!("expected balance payload, got {other:?}"),
    }

    let ledger = instance.engine().ledger();
    let btc = ledger.get("BTC").unwrap();
    let usdt = ledger.get("USDT").unwrap();
    assert!(btc.total > 10_000.0, "buy must credit base");
    assert!(usdt.total < 10_000.0, "buy must debit quote");

    instance.shutdown().await;
}

#[tokio::test]
async fn test_gtc_remainder_rests_and_is_indexed() {
    let (instance, mut events) = started_instance();
    let ctx = CancellationToken::new();

    // Far below the market: never marketable, rests in full.
    instance
        .submit_order(&ctx, limit_order("BUY", "0.5", "40000.00", "GTC"))
        .await
        .unwrap();

    let ack = next_exec_report(&mut events).await;
    assert_eq!(ack.state, OrderState::Ack);

    let engine = instance.engine();
    let entry = engine.catalogue().get("BTC-USDT").unwrap();
    let state = engine.market().state_for(&entry);
    let guard = lock_state(&state);
    let order = guard.orders.get(&ack.exchange_order_id).expect("indexed");
    assert!(order.remaining() > 0.0);
    assert_eq!(order.side, Side::Buy);
    let expected_tick = entry.constraints.tick_for_price(40_000.0);
    assert_eq!(order.tick, expected_tick);
    assert!(guard
        .book
        .contains_order(Side::Buy, expected_tick, &ack.exchange_order_id));
    drop(guard);

    instance.shutdown().await;
}

#[tokio::test]
async fn test_taker_fills_resting_order_and_maker_reports_follow() {
    let (instance, mut events) = started_instance();
    let ctx = CancellationToken::new();

    // Rest a sell just above the current best ask region is marketable;
    // instead rest a sell far above, then lift it with a crossing buy.
    let resting_price = best_ask(&instance) + 1000.0;
    let mut resting = limit_order("SELL", "0.2", &format!("{resting_price:.2}"), "GTC");
    resting.client_order_id = "maker-1".to_string();
    instance.submit_order(&ctx, resting).await.unwrap();
    let maker_ack = next_exec_report(&mut events).await;
    assert_eq!(maker_ack.state, OrderState::Ack);

    // A buy limited exactly at the resting price sweeps all synthetic asks
    // below it and then the maker, FIFO at its level.
    let sweep_qty = ask_side_total(&instance);
    let mut taker = limit_order(
        "BUY",
        &format!("{sweep_qty:.4}"),
        &format!("{resting_price:.2}"),
        "IOC",
    );
    taker.client_order_id = "taker-1".to_string();
    instance.submit_order(&ctx, taker).await.unwrap();

    let taker_ack = next_exec_report(&mut events).await;
    assert_eq!(taker_ack.state, OrderState::Ack);
    assert_eq!(taker_ack.client_order_id, "taker-1");

    let taker_fill = next_exec_report(&mut events).await;
    assert_eq!(taker_fill.client_order_id, "taker-1");
    assert!(matches!(
        taker_fill.state,
        OrderState::Filled | OrderState::PartiallyFilled
    ));

    // The maker's own report comes after the taker's.
    let mut saw_maker = false;
    for _ in 0..4 {
        let report = next_exec_report(&mut events).await;
        if report.client_order_id == "maker-1" {
            assert!(matches!(
                report.state,
                OrderState::Filled | OrderState::PartiallyFilled
            ));
            saw_maker = true;
            break;
        }
    }
    assert!(saw_maker, "maker exec-report never emitted");

    instance.shutdown().await;
}

#[tokio::test]
async fn test_validation_rejections() {
    let (instance, mut events) = started_instance();
    let ctx = CancellationToken::new();

    let cases: Vec<(OrderRequest, &str)> = vec![
        (
            OrderRequest {
                symbol: "DOGE-USDT".to_string(),
                side: "BUY".to_string(),
                order_type: "LIMIT".to_string(),
                quantity: "1".to_string(),
                price: Some("1".to_string()),
                ..OrderRequest::default()
            },
            "unknown instrument",
        ),
        (
            limit_order("HOLD", "1", "50000", "GTC"),
            "missing or unknown side",
        ),
        (
            OrderRequest {
                order_type: "STOP_LIMIT".to_string(),
                ..limit_order("BUY", "1", "50000", "GTC")
            },
            "unsupported order type",
        ),
        (
            limit_order("BUY", "-3", "50000", "GTC"),
            "invalid quantity",
        ),
        (
            limit_order("BUY", "0.00005", "50000", "GTC"),
            "quantity outside instrument constraints",
        ),
        (
            OrderRequest {
                price: None,
                ..limit_order("BUY", "1", "", "GTC")
            },
            "limit order requires a price",
        ),
        (
            limit_order("BUY", "1", "not-a-price", "GTC"),
            "invalid limit price",
        ),
        (
            limit_order("BUY", "0.0001", "0.01", "GTC"),
            "order notional below minimum",
        ),
    ];

    for (request, expected_reason) in cases {
        instance.submit_order(&ctx, request).await.unwrap();
        let report = next_exec_report(&mut events).await;
        assert_eq!(report.state, OrderState::Rejected, "case {expected_reason}");
        assert_eq!(report.reject_reason.as_deref(), Some(expected_reason));
        assert!(report.exchange_order_id.is_empty());
    }

    instance.shutdown().await;
}

#[tokio::test]
async fn test_disconnected_venue_rejects_with_venue_unavailable() {
    let mut config = quiet_config();
    config.venue = VenueBehaviourParams {
        disconnect_chance: 1.0,
        disconnect_for: Duration::from_secs(60),
        ..VenueBehaviourParams::quiet()
    };
    let instance = instance_with(config);
    let mut events = instance.events().unwrap();
    let mut errors = instance.errors().unwrap();
    instance.start().unwrap();
    let ctx = CancellationToken::new();

    instance
        .submit_order(&ctx, limit_order("BUY", "0.5", "40000.00", "GTC"))
        .await
        .unwrap();

    let report = next_exec_report(&mut events).await;
    assert_eq!(report.state, OrderState::Rejected);
    assert_eq!(report.reject_reason.as_deref(), Some("venue unavailable"));

    // Entering the disconnect window also put a venue error on the channel.
    let err = errors.recv().await.unwrap();
    assert!(matches!(err, VenueError::Venue(_)));

    instance.shutdown().await;
}

#[tokio::test]
async fn test_cancelled_caller_context_aborts_silently() {
    let mut config = quiet_config();
    // Real latency so cancellation lands mid-wait.
    config.venue.latency_min = Duration::from_millis(200);
    config.venue.latency_max = Duration::from_millis(400);
    let instance = instance_with(config);
    let mut events = instance.events().unwrap();
    instance.start().unwrap();

    let ctx = CancellationToken::new();
    instance
        .submit_order(&ctx, market_order("BUY", "0.1", "IOC"))
        .await
        .unwrap();
    ctx.cancel();

    let silence = drain_for(&mut events, Duration::from_millis(600)).await;
    assert!(
        silence.is_empty(),
        "aborted order must emit nothing, got {silence:?}"
    );
    instance.shutdown().await;
}
