//! Shared fixtures: a heap-backed event pool, quiet deterministic configs,
//! and event-stream helpers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use venuesim::events::ExecReportPayload;
use venuesim::prelude::*;
use venuesim::VenueBehaviourParams;

/// Pool that allocates on demand and counts returns. The core treats it as
/// the external allocator it never owns.
#[derive(Default)]
pub struct TestPool {
    pub borrowed: AtomicUsize,
    pub returned: AtomicUsize,
}

#[async_trait]
impl EventPool for TestPool {
    async fn borrow_event(&self, _cancel: &CancellationToken) -> Result<Box<Event>, VenueError> {
        self.borrowed.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(Event::empty()))
    }

    fn return_event(&self, _event: Box<Event>) {
        self.returned.fetch_add(1, Ordering::Relaxed);
    }
}

/// Pool that always refuses to lend.
pub struct ExhaustedPool;

#[async_trait]
impl EventPool for ExhaustedPool {
    async fn borrow_event(&self, _cancel: &CancellationToken) -> Result<Box<Event>, VenueError> {
        Err(VenueError::PoolExhausted)
    }

    fn return_event(&self, _event: Box<Event>) {}
}

/// A seeded config with every stochastic venue disruption off and short
/// producer cadences, so scenario tests run fast and deterministically.
pub fn quiet_config() -> SimulatorConfig {
    let mut config = SimulatorConfig::default();
    config.seed = Some(7);
    config.venue = VenueBehaviourParams::quiet();
    config.ticker_interval = Duration::from_millis(50);
    config.trade_interval = Duration::from_millis(50);
    config.book_snapshot_interval = Duration::from_millis(80);
    config.book_diff_interval = Duration::from_millis(40);
    config.balance_update_interval = Duration::from_millis(50);
    config
}

/// Build an instance over the default catalogue with the given config.
pub fn instance_with(config: SimulatorConfig) -> Arc<VenueSimulator> {
    VenueSimulator::new(
        CancellationToken::new(),
        Arc::new(TestPool::default()),
        config,
        Arc::new(StaticInstrumentSource(default_instruments())),
    )
}

/// Build a quiet, started instance and take its events receiver.
pub fn started_instance() -> (Arc<VenueSimulator>, mpsc::Receiver<Box<Event>>) {
    let instance = instance_with(quiet_config());
    let events = instance.events().unwrap();
    instance.start().unwrap();
    (instance, events)
}

/// Receive the next event of one type within a second, skipping others.
pub async fn next_event_of(
    events: &mut mpsc::Receiver<Box<Event>>,
    event_type: EventType,
) -> Box<Event> {
    loop {
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("events channel closed");
        if event.event_type == event_type {
            return event;
        }
    }
}

/// Receive the next execution report within a second.
pub async fn next_exec_report(events: &mut mpsc::Receiver<Box<Event>>) -> ExecReportPayload {
    let event = next_event_of(events, EventType::ExecReport).await;
    match &event.payload {
        EventPayload::Exec(report) => report.clone(),
        other => panic!("expected exec payload, got {other:?}"),
    }
}

/// Drain everything already buffered plus whatever arrives within `window`.
pub async fn drain_for(
    events: &mut mpsc::Receiver<Box<Event>>,
    window: Duration,
) -> Vec<Box<Event>> {
    let mut collected = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match timeout(deadline.saturating_duration_since(tokio::time::Instant::now()), events.recv()).await {
            Ok(Some(event)) => collected.push(event),
            Ok(None) => break,
            Err(_) => break,
        }
    }
    collected
}

/// A limit-order request against the default BTC pair.
pub fn limit_order(side: &str, quantity: &str, price: &str, tif: &str) -> OrderRequest {
    OrderRequest {
        provider: String::new(),
        symbol: "BTC-USDT".to_string(),
        side: side.to_string(),
        order_type: "LIMIT".to_string(),
        time_in_force: tif.to_string(),
        quantity: quantity.to_string(),
        price: Some(price.to_string()),
        client_order_id: "client-test".to_string(),
        timestamp: None,
    }
}

/// A market-order request against the default BTC pair.
pub fn market_order(side: &str, quantity: &str, tif: &str) -> OrderRequest {
    OrderRequest {
        provider: String::new(),
        symbol: "BTC-USDT".to_string(),
        side: side.to_string(),
        order_type: "MARKET".to_string(),
        time_in_force: tif.to_string(),
        quantity: quantity.to_string(),
        price: None,
        client_order_id: "client-test".to_string(),
        timestamp: None,
    }
}
