//! Per-route producer loops.
//!
//! Each subscribed route runs one cancellable task. Producers tick a timer,
//! run the venue gates per emission, and hand payloads to the emitter; the
//! bounded events channel provides the backpressure that throttles them.

use crate::engine::OrderEngine;
use crate::error::VenueError;
use crate::events::payloads::{
    BookLevel, BookPayload, BookPayloadKind, EventPayload, KlinePayload, TickerPayload,
};
use crate::events::EventType;
use crate::instrument::CatalogueEntry;
use crate::market::depth::{LevelChange, PriceTick, Side};
use crate::market::state::lock_state;
use crate::utils::{djb2_checksum, now_utc};
use crate::venue::{GateOutcome, OperationalStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A subscription request: a canonical route type plus field filters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Route {
    /// Canonical route type, e.g. `ORDERBOOK.SNAPSHOT`
    #[serde(rename = "type")]
    pub route_type: String,
    /// Field filters scoping the emissions
    #[serde(default)]
    pub filters: Vec<RouteFilter>,
}

/// One route filter. Values may be a string, a list of strings, or a list
/// of arbitrary values (non-strings are skipped).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RouteFilter {
    /// Filtered field, e.g. `instrument` or `currency`
    pub field: String,
    /// Filter value(s)
    pub value: Value,
}

/// Collect the normalized (uppercased) values of every filter on `field`.
/// `None` means the field is unfiltered.
pub(crate) fn filter_values(filters: &[RouteFilter], field: &str) -> Option<Vec<String>> {
    let mut values = Vec::new();
    for filter in filters.iter().filter(|f| f.field.eq_ignore_ascii_case(field)) {
        match &filter.value {
            Value::String(s) => values.push(s.trim().to_uppercase()),
            Value::Array(items) => {
                for item in items {
                    if let Some(s) = item.as_str() {
                        values.push(s.trim().to_uppercase());
                    }
                }
            }
            _ => {}
        }
    }
    if values.is_empty() { None } else { Some(values) }
}

/// Dispatch a producer loop for the subscribed event type. Returns when the
/// route token is cancelled.
pub(crate) async fn run_route(
    engine: Arc<OrderEngine>,
    event_type: EventType,
    filters: Vec<RouteFilter>,
    token: CancellationToken,
) {
    debug!(event_type = %event_type, "route producer starting");
    match event_type {
        EventType::Ticker => run_ticker(engine, filters, token.clone()).await,
        EventType::Trade => run_trade(engine, filters, token.clone()).await,
        EventType::BookSnapshot => run_book(engine, filters, token.clone()).await,
        EventType::KlineSummary => run_kline(engine, filters, token.clone()).await,
        EventType::BalanceUpdate => run_balance(engine, filters, token.clone()).await,
        // These events arise from other paths; the producer only waits for
        // cancellation.
        EventType::InstrumentUpdate | EventType::ExecReport => token.cancelled().await,
    }
    debug!(event_type = %event_type, "route producer stopped");
}

fn route_symbols(engine: &OrderEngine, filter: &Option<Vec<String>>) -> Vec<String> {
    let all = engine.catalogue.symbols();
    match filter {
        None => all,
        Some(wanted) => all.into_iter().filter(|s| wanted.contains(s)).collect(),
    }
}

fn ticker_at(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Run the three venue gates; `false` means the emission is dropped (an
/// error was put on the error channel where the gate asks for one).
async fn pass_gates(engine: &OrderEngine, token: &CancellationToken) -> bool {
    if engine.venue.latency_gate(token).await == GateOutcome::Aborted {
        return false;
    }
    if let OperationalStatus::Disconnected { notice } = engine.venue.operational_gate() {
        if let Some(message) = notice {
            engine.emitter.emit_error(VenueError::Venue(message));
        }
        return false;
    }
    if let Some(message) = engine.venue.transient_gate() {
        engine.emitter.emit_error(VenueError::Venue(message));
        return false;
    }
    true
}

async fn run_ticker(engine: Arc<OrderEngine>, filters: Vec<RouteFilter>, token: CancellationToken) {
    let filter = filter_values(&filters, "instrument");
    let mut timer = ticker_at(engine.config.ticker_interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = timer.tick() => {}
        }
        for symbol in route_symbols(&engine, &filter) {
            if token.is_cancelled() {
                break;
            }
            let Some(entry) = engine.catalogue.get(&symbol) else {
                continue;
            };
            if !pass_gates(&engine, &token).await {
                continue;
            }
            emit_ticker(&engine, &entry, &token).await;
        }
    }
}

async fn emit_ticker(engine: &OrderEngine, entry: &CatalogueEntry, token: &CancellationToken) {
    let constraints = &entry.constraints;
    let symbol = &entry.instrument.symbol;
    let ts = now_utc();
    let state_arc = engine.market.state_for(entry);
    let payload = {
        let mut market = lock_state(&state_arc);
        let sampled = engine.rng.next_price(
            &engine.config.price_model,
            market.last_price,
            market.base_price,
        );
        market.last_price = constraints.normalize_price(sampled);
        let last = market.last_price;
        let changes = market.book.mutate(
            &engine.rng,
            constraints,
            last,
            engine.config.book_levels,
            engine.config.max_mutation_width,
        );
        market.pending_diff.extend(changes);
        TickerPayload {
            last_price: constraints.format_price(last),
            best_bid: constraints
                .format_price(market.book.best_bid(constraints).unwrap_or(last * 0.999)),
            best_ask: constraints
                .format_price(market.book.best_ask(constraints).unwrap_or(last * 1.001)),
            volume_24h: constraints.format_quantity(market.volume_24h),
            timestamp: ts,
        }
    };
    engine
        .emitter
        .emit_with_cancel(token, EventType::Ticker, symbol, ts, |_| {
            EventPayload::Ticker(payload)
        })
        .await;
}

async fn run_trade(engine: Arc<OrderEngine>, filters: Vec<RouteFilter>, token: CancellationToken) {
    let filter = filter_values(&filters, "instrument");
    let mut timer = ticker_at(engine.config.trade_interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = timer.tick() => {}
        }
        for symbol in route_symbols(&engine, &filter) {
            if token.is_cancelled() {
                break;
            }
            let Some(entry) = engine.catalogue.get(&symbol) else {
                continue;
            };
            if !pass_gates(&engine, &token).await {
                continue;
            }
            engine.emit_trade(&token, &entry).await;
        }
    }
}

async fn run_book(engine: Arc<OrderEngine>, filters: Vec<RouteFilter>, token: CancellationToken) {
    let filter = filter_values(&filters, "instrument");

    // Initial snapshots before the timers start alternating.
    for symbol in route_symbols(&engine, &filter) {
        if token.is_cancelled() {
            return;
        }
        let Some(entry) = engine.catalogue.get(&symbol) else {
            continue;
        };
        if pass_gates(&engine, &token).await {
            emit_snapshot(&engine, &entry, &token).await;
        }
    }

    let mut snapshots = ticker_at(engine.config.book_snapshot_interval);
    let mut diffs = ticker_at(engine.config.book_diff_interval);
    loop {
        enum Tick {
            Snapshot,
            Diff,
        }
        let tick = tokio::select! {
            _ = token.cancelled() => break,
            _ = snapshots.tick() => Tick::Snapshot,
            _ = diffs.tick() => Tick::Diff,
        };
        for symbol in route_symbols(&engine, &filter) {
            if token.is_cancelled() {
                break;
            }
            let Some(entry) = engine.catalogue.get(&symbol) else {
                continue;
            };
            if !pass_gates(&engine, &token).await {
                continue;
            }
            match tick {
                Tick::Snapshot => emit_snapshot(&engine, &entry, &token).await,
                Tick::Diff => emit_diff(&engine, &entry, &token).await,
            }
        }
    }
}

fn to_levels(entries: Vec<(f64, f64)>, entry: &CatalogueEntry) -> Vec<BookLevel> {
    entries
        .into_iter()
        .map(|(price, quantity)| BookLevel {
            price: entry.constraints.format_price(price),
            quantity: entry.constraints.format_quantity(quantity),
        })
        .collect()
}

async fn emit_snapshot(engine: &OrderEngine, entry: &CatalogueEntry, token: &CancellationToken) {
    let symbol = entry.instrument.symbol.clone();
    let ts = now_utc();
    let levels = engine.config.book_levels;
    let state_arc = engine.market.state_for(entry);
    let (bids, asks) = {
        let market = lock_state(&state_arc);
        (
            market.book.snapshot(&entry.constraints, Side::Buy, levels),
            market.book.snapshot(&entry.constraints, Side::Sell, levels),
        )
    };
    let bids = to_levels(bids, entry);
    let asks = to_levels(asks, entry);
    engine
        .emitter
        .emit_with_cancel(token, EventType::BookSnapshot, &symbol, ts, |sequence| {
            EventPayload::Book(BookPayload {
                kind: BookPayloadKind::Snapshot,
                bids,
                asks,
                checksum: djb2_checksum(&format!(
                    "{symbol}|{}|{sequence}",
                    EventType::BookSnapshot.as_str()
                )),
                timestamp: ts,
            })
        })
        .await;
}

async fn emit_diff(engine: &OrderEngine, entry: &CatalogueEntry, token: &CancellationToken) {
    let symbol = entry.instrument.symbol.clone();
    let ts = now_utc();
    let state_arc = engine.market.state_for(entry);
    let changes: Vec<LevelChange> = {
        let mut market = lock_state(&state_arc);
        std::mem::take(&mut market.pending_diff)
    };
    if changes.is_empty() {
        return;
    }

    // Last write wins per (side, tick); best-first within each side.
    let mut latest: HashMap<(Side, PriceTick), f64> = HashMap::new();
    for change in changes {
        latest.insert((change.side, change.tick), change.quantity);
    }
    let mut bid_ticks: Vec<(PriceTick, f64)> = Vec::new();
    let mut ask_ticks: Vec<(PriceTick, f64)> = Vec::new();
    for ((side, tick), quantity) in latest {
        match side {
            Side::Buy => bid_ticks.push((tick, quantity)),
            Side::Sell => ask_ticks.push((tick, quantity)),
        }
    }
    bid_ticks.sort_by(|a, b| b.0.cmp(&a.0));
    ask_ticks.sort_by(|a, b| a.0.cmp(&b.0));

    let constraints = &entry.constraints;
    let to_level = |(tick, quantity): (PriceTick, f64)| BookLevel {
        price: constraints.format_price(constraints.price_for_tick(tick)),
        quantity: constraints.format_quantity(quantity),
    };
    let bids: Vec<BookLevel> = bid_ticks.into_iter().map(to_level).collect();
    let asks: Vec<BookLevel> = ask_ticks.into_iter().map(to_level).collect();

    engine
        .emitter
        .emit_with_cancel(token, EventType::BookSnapshot, &symbol, ts, |sequence| {
            EventPayload::Book(BookPayload {
                kind: BookPayloadKind::Delta,
                bids,
                asks,
                checksum: djb2_checksum(&format!(
                    "{symbol}|{}|{sequence}",
                    EventType::BookSnapshot.as_str()
                )),
                timestamp: ts,
            })
        })
        .await;
}

async fn run_kline(engine: Arc<OrderEngine>, filters: Vec<RouteFilter>, token: CancellationToken) {
    let filter = filter_values(&filters, "instrument");
    let interval = engine.config.kline_interval;
    let mut timer = ticker_at(interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = timer.tick() => {}
        }
        for symbol in route_symbols(&engine, &filter) {
            if token.is_cancelled() {
                break;
            }
            let Some(entry) = engine.catalogue.get(&symbol) else {
                continue;
            };
            if !pass_gates(&engine, &token).await {
                continue;
            }
            let ts = now_utc();
            let state_arc = engine.market.state_for(&entry);
            let windows = {
                let mut market = lock_state(&state_arc);
                let last = market.last_price;
                market.klines.update(ts, last, 0.0, interval);
                market.klines.finalize(ts, interval)
            };
            for window in windows {
                let constraints = &entry.constraints;
                let payload = KlinePayload {
                    open_time: window.open_time,
                    close_time: window.close_time,
                    open: constraints.format_price(window.open),
                    high: constraints.format_price(window.high),
                    low: constraints.format_price(window.low),
                    close: constraints.format_price(window.close),
                    volume: constraints.format_quantity(window.volume),
                    interval_ms: interval.as_millis() as u64,
                };
                engine
                    .emitter
                    .emit_with_cancel(&token, EventType::KlineSummary, &symbol, ts, |_| {
                        EventPayload::Kline(payload)
                    })
                    .await;
            }
        }
    }
}

async fn run_balance(engine: Arc<OrderEngine>, filters: Vec<RouteFilter>, token: CancellationToken) {
    let filter = filter_values(&filters, "currency");
    let mut timer = ticker_at(engine.config.balance_update_interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = timer.tick() => {}
        }
        let currencies = match &filter {
            Some(wanted) => wanted.clone(),
            None => engine.catalogue.currencies(),
        };
        for currency in currencies {
            if token.is_cancelled() {
                break;
            }
            if !pass_gates(&engine, &token).await {
                continue;
            }
            let rng = engine.rng.clone();
            let balance = engine.ledger.update(&currency, |b| {
                let delta = rng.range_f64(-12.5, 12.5);
                b.total = (b.total + delta).max(0.0);
                b.available = b.total * rng.range_f64(0.3, 0.9);
            });
            engine.emit_balance(&token, &currency, balance, now_utc()).await;
        }
    }
}
