//! Start/shutdown semantics, channel ownership, sequence monotonicity.

use crate::helpers::*;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use venuesim::prelude::*;

#[tokio::test]
async fn test_start_is_idempotent_by_cas() {
    let instance = instance_with(quiet_config());
    instance.start().unwrap();
    assert_eq!(instance.start().unwrap_err(), VenueError::AlreadyStarted);
    instance.shutdown().await;
}

#[tokio::test]
async fn test_receivers_are_takeable_once() {
    let instance = instance_with(quiet_config());
    let _events = instance.events().unwrap();
    assert_eq!(instance.events().unwrap_err(), VenueError::ReceiverTaken);
    let _errors = instance.errors().unwrap();
    assert_eq!(instance.errors().unwrap_err(), VenueError::ReceiverTaken);
}

#[tokio::test]
async fn test_submit_requires_start() {
    let instance = instance_with(quiet_config());
    let ctx = CancellationToken::new();
    let err = instance
        .submit_order(&ctx, market_order("BUY", "0.1", "IOC"))
        .await
        .unwrap_err();
    assert_eq!(err, VenueError::NotStarted);
}

#[tokio::test]
async fn test_submit_with_cancelled_context_fails_fast() {
    let (instance, _events) = started_instance();
    let ctx = CancellationToken::new();
    ctx.cancel();
    let err = instance
        .submit_order(&ctx, market_order("BUY", "0.1", "IOC"))
        .await
        .unwrap_err();
    assert_eq!(err, VenueError::Cancelled);
    instance.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_both_channels_and_keeps_buffered_events() {
    let (instance, mut events) = started_instance();
    let mut errors = instance.errors().unwrap();
    instance
        .subscribe_route(Route {
            route_type: "TICKER".to_string(),
            filters: vec![],
        })
        .await
        .unwrap();

    // At least one event flows before shutdown.
    let first = next_event_of(&mut events, EventType::Ticker).await;
    assert!(first.sequence >= 1);

    instance.shutdown().await;

    // Anything buffered remains readable; then the stream ends.
    let end = timeout(Duration::from_secs(1), async {
        while let Some(_event) = events.recv().await {}
    })
    .await;
    assert!(end.is_ok(), "events channel must close after shutdown");

    let errors_end = timeout(Duration::from_secs(1), async {
        while let Some(_err) = errors.recv().await {}
    })
    .await;
    assert!(errors_end.is_ok(), "errors channel must close after shutdown");

    // Post-shutdown calls surface the lifecycle error.
    let ctx = CancellationToken::new();
    let err = instance
        .submit_order(&ctx, market_order("BUY", "0.1", "IOC"))
        .await
        .unwrap_err();
    assert_eq!(err, VenueError::ShuttingDown);
    assert_eq!(instance.start().unwrap_err(), VenueError::ShuttingDown);
}

#[tokio::test]
async fn test_shutdown_is_safe_to_repeat() {
    let (instance, _events) = started_instance();
    instance.shutdown().await;
    instance.shutdown().await;
}

#[tokio::test]
async fn test_sequences_strictly_increase_per_type_and_symbol() {
    let (instance, mut events) = started_instance();
    instance
        .subscribe_route(Route {
            route_type: "TICKER".to_string(),
            filters: vec![],
        })
        .await
        .unwrap();
    instance
        .subscribe_route(Route {
            route_type: "TRADE".to_string(),
            filters: vec![],
        })
        .await
        .unwrap();

    let collected = drain_for(&mut events, Duration::from_millis(400)).await;
    assert!(!collected.is_empty());

    let mut last_seen: HashMap<(EventType, String), u64> = HashMap::new();
    for event in collected {
        let key = (event.event_type, event.symbol.clone());
        let previous = last_seen.insert(key.clone(), event.sequence);
        match previous {
            None => assert_eq!(event.sequence, 1, "first sequence for {key:?}"),
            Some(previous) => assert!(
                event.sequence > previous,
                "sequence regressed for {key:?}: {} after {previous}",
                event.sequence
            ),
        }
    }
    instance.shutdown().await;
}

#[tokio::test]
async fn test_pool_exhaustion_drops_payloads_and_reports_errors() {
    let instance = VenueSimulator::new(
        CancellationToken::new(),
        std::sync::Arc::new(ExhaustedPool),
        quiet_config(),
        std::sync::Arc::new(StaticInstrumentSource(default_instruments())),
    );
    let mut events = instance.events().unwrap();
    let mut errors = instance.errors().unwrap();
    instance.start().unwrap();
    instance
        .subscribe_route(Route {
            route_type: "TICKER".to_string(),
            filters: vec![],
        })
        .await
        .unwrap();

    let err = timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("expected a pool error")
        .unwrap();
    assert_eq!(err, VenueError::PoolExhausted);

    let silence = drain_for(&mut events, Duration::from_millis(150)).await;
    assert!(silence.is_empty(), "no events can flow without a pool");
    instance.shutdown().await;
}
