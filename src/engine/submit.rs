//! Order submission lifecycle.
//!
//! Validation failures surface as REJECTED execution reports on the events
//! channel, not as errors from the submission call. All book and index
//! mutation happens synchronously under the instrument lock; events and
//! balance settlement follow after the lock is released.

use super::ledger::{BalanceLedger, BalanceState};
use crate::config::SimulatorConfig;
use crate::error::VenueError;
use crate::events::payloads::{format_balance, BalancePayload, EventPayload, ExecReportPayload};
use crate::events::{EventEmitter, EventType};
use crate::instrument::{CatalogueEntry, InstrumentCatalogue, InstrumentConstraints};
use crate::market::depth::{
    ActiveOrder, Fill, OrderKind, OrderState, Side, TimeInForce, QTY_EPSILON,
};
use crate::market::model::SharedRng;
use crate::market::state::{lock_state, MarketState};
use crate::utils::{compact_symbol, now_utc};
use crate::venue::{GateOutcome, OperationalStatus, VenueBehaviour};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// A simulated order request, fields as they arrive on the wire.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct OrderRequest {
    /// Target provider; filled with the instance name when empty
    #[serde(default)]
    pub provider: String,
    /// Instrument symbol, any casing
    pub symbol: String,
    /// `BUY` or `SELL`
    pub side: String,
    /// `LIMIT` or `MARKET`
    pub order_type: String,
    /// `IOC`, `FOK`, `POST`/`POST_ONLY`/`PO`, anything else means GTC
    #[serde(default)]
    pub time_in_force: String,
    /// Decimal quantity string
    pub quantity: String,
    /// Decimal limit price string; required for limit orders
    #[serde(default)]
    pub price: Option<String>,
    /// Caller's order id; a fresh UUID is assigned when empty
    #[serde(default)]
    pub client_order_id: String,
    /// Submission timestamp; zero or missing defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Result of the locked portion of a submission.
enum ExecOutcome {
    Rejected(&'static str),
    Accepted {
        reports: Vec<ExecReportPayload>,
        fills: Vec<Fill>,
        side: Side,
    },
}

/// The matching engine and its collaborators.
pub struct OrderEngine {
    pub(crate) config: SimulatorConfig,
    pub(crate) catalogue: Arc<InstrumentCatalogue>,
    pub(crate) market: Arc<MarketState>,
    pub(crate) ledger: Arc<BalanceLedger>,
    pub(crate) venue: Arc<VenueBehaviour>,
    pub(crate) rng: Arc<SharedRng>,
    pub(crate) emitter: Arc<EventEmitter>,
    next_order_id: AtomicU64,
}

impl OrderEngine {
    /// Wire an engine to its collaborators.
    pub fn new(
        config: SimulatorConfig,
        catalogue: Arc<InstrumentCatalogue>,
        market: Arc<MarketState>,
        ledger: Arc<BalanceLedger>,
        venue: Arc<VenueBehaviour>,
        rng: Arc<SharedRng>,
        emitter: Arc<EventEmitter>,
    ) -> Self {
        Self {
            config,
            catalogue,
            market,
            ledger,
            venue,
            rng,
            emitter,
            next_order_id: AtomicU64::new(1),
        }
    }

    /// The instrument catalogue this engine trades against.
    pub fn catalogue(&self) -> &Arc<InstrumentCatalogue> {
        &self.catalogue
    }

    /// The per-instrument market state table.
    pub fn market(&self) -> &Arc<MarketState> {
        &self.market
    }

    /// The balance ledger fills settle into.
    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    /// Mint a venue order id: `{SYMBOL-no-dash}-{six digits}`, monotonic per
    /// instance.
    fn mint_exchange_order_id(&self, symbol: &str) -> String {
        let n = self.next_order_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:06}", compact_symbol(symbol), n % 1_000_000)
    }

    /// Process one submitted order end to end.
    ///
    /// Runs on the order-consumer task. A cancellation of `cancel` during
    /// the injected latency wait aborts silently with no reports.
    pub async fn handle_order(&self, request: OrderRequest, cancel: &CancellationToken) {
        let started = std::time::Instant::now();
        let symbol = InstrumentCatalogue::normalize_symbol(&request.symbol);
        let ts = request
            .timestamp
            .filter(|t| t.timestamp_millis() != 0)
            .unwrap_or_else(now_utc);

        metrics::counter!(
            "venue_orders_received_total",
            "environment" => self.config.environment.clone(),
            "provider" => self.config.name.clone(),
            "symbol" => symbol.clone(),
            "side" => request.side.trim().to_uppercase(),
            "order_type" => request.order_type.trim().to_uppercase(),
            "tif" => TimeInForce::parse(&request.time_in_force).as_str()
        )
        .increment(1);

        let Some(entry) = self.catalogue.get(&symbol) else {
            self.reject(&request, &symbol, None, ts, "unknown instrument", started)
                .await;
            return;
        };
        let constraints = entry.constraints.clone();

        let Some(side) = Side::parse(&request.side) else {
            self.reject(&request, &symbol, Some(&constraints), ts, "missing or unknown side", started)
                .await;
            return;
        };
        let Some(kind) = OrderKind::parse(&request.order_type) else {
            self.reject(&request, &symbol, Some(&constraints), ts, "unsupported order type", started)
                .await;
            return;
        };
        let quantity = match request.quantity.trim().parse::<f64>() {
            Ok(q) if q > 0.0 && q.is_finite() => q,
            _ => {
                self.reject(&request, &symbol, Some(&constraints), ts, "invalid quantity", started)
                    .await;
                return;
            }
        };
        if !constraints.valid_quantity(quantity) {
            self.reject(
                &request,
                &symbol,
                Some(&constraints),
                ts,
                "quantity outside instrument constraints",
                started,
            )
            .await;
            return;
        }
        let limit_price = match kind {
            OrderKind::Limit => {
                let Some(raw) = request
                    .price
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                else {
                    self.reject(
                        &request,
                        &symbol,
                        Some(&constraints),
                        ts,
                        "limit order requires a price",
                        started,
                    )
                    .await;
                    return;
                };
                match raw.parse::<f64>() {
                    Ok(p) if p > 0.0 && p.is_finite() => constraints.normalize_price(p),
                    _ => {
                        self.reject(
                            &request,
                            &symbol,
                            Some(&constraints),
                            ts,
                            "invalid limit price",
                            started,
                        )
                        .await;
                        return;
                    }
                }
            }
            OrderKind::Market => 0.0,
        };
        if kind == OrderKind::Limit && !constraints.enforce_notional(limit_price, quantity) {
            self.reject(
                &request,
                &symbol,
                Some(&constraints),
                ts,
                "order notional below minimum",
                started,
            )
            .await;
            return;
        }

        // Venue gates: latency first, then the operational re-check.
        if self.venue.latency_gate(cancel).await == GateOutcome::Aborted {
            debug!(symbol = %symbol, "order aborted during latency wait");
            return;
        }
        if let OperationalStatus::Disconnected { notice } = self.venue.operational_gate() {
            if let Some(message) = notice {
                self.emitter.emit_error(VenueError::Venue(message));
            }
            self.reject(&request, &symbol, Some(&constraints), ts, "venue unavailable", started)
                .await;
            return;
        }

        let tif = TimeInForce::parse(&request.time_in_force);
        let outcome = self.execute(&entry, &request, side, kind, tif, quantity, limit_price, ts);

        match outcome {
            ExecOutcome::Rejected(reason) => {
                self.reject(&request, &symbol, Some(&constraints), ts, reason, started)
                    .await;
            }
            ExecOutcome::Accepted {
                reports,
                fills,
                side,
            } => {
                let mut balance_updates = Vec::new();
                for fill in &fills {
                    balance_updates.extend(self.ledger.apply_fill(
                        &entry.instrument.base_currency,
                        &entry.instrument.quote_currency,
                        side,
                        fill.quantity,
                        fill.price,
                    ));
                }
                let root = self.emitter.cancellation().clone();
                for report in reports {
                    self.emit_exec_report(&root, &symbol, ts, report).await;
                }
                for (currency, balance) in balance_updates {
                    self.emit_balance(&root, &currency, balance, ts).await;
                }
                metrics::histogram!(
                    "venue_order_handle_ms",
                    "environment" => self.config.environment.clone(),
                    "provider" => self.config.name.clone(),
                    "symbol" => symbol.clone(),
                    "result" => "accepted"
                )
                .record(started.elapsed().as_secs_f64() * 1000.0);
            }
        }
    }

    /// The locked portion: TIF prechecks, order construction, matching,
    /// resting and recentering. No awaits, no emissions.
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        entry: &CatalogueEntry,
        request: &OrderRequest,
        side: Side,
        kind: OrderKind,
        tif: TimeInForce,
        quantity: f64,
        limit_price: f64,
        ts: DateTime<Utc>,
    ) -> ExecOutcome {
        let constraints = &entry.constraints;
        let symbol = &entry.instrument.symbol;
        let state_arc = self.market.state_for(entry);
        let mut market = lock_state(&state_arc);

        if tif == TimeInForce::Fok {
            let price_limit = if kind == OrderKind::Limit { limit_price } else { 0.0 };
            let available = market.book.available_liquidity(constraints, side, price_limit);
            if available + QTY_EPSILON < quantity {
                return ExecOutcome::Rejected("FOK insufficient liquidity");
            }
        }
        if tif == TimeInForce::PostOnly
            && kind == OrderKind::Limit
            && market.book.is_marketable(constraints, side, limit_price)
        {
            return ExecOutcome::Rejected("post-only order would cross the book");
        }

        let client_order_id = if request.client_order_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request.client_order_id.trim().to_string()
        };
        let order = Arc::new(ActiveOrder::new(
            client_order_id,
            self.mint_exchange_order_id(symbol),
            symbol.clone(),
            side,
            kind,
            tif,
            limit_price,
            constraints.tick_for_price(limit_price),
            quantity,
            ts,
        ));

        let mut reports = vec![Self::report_for(&order, OrderState::Ack, constraints, None, ts)];
        let mut fills: Vec<Fill> = Vec::new();

        let marketable =
            kind == OrderKind::Market || market.book.is_marketable(constraints, side, limit_price);
        if marketable {
            let price_limit = if kind == OrderKind::Market { 0.0 } else { limit_price };
            let outcome = market
                .book
                .consume_liquidity(constraints, side, quantity, price_limit, ts);
            if outcome.filled > QTY_EPSILON {
                for fill in &outcome.fills {
                    order.apply_fill(fill.quantity, fill.price, ts);
                }
                let taker_state = if order.is_fully_filled() {
                    OrderState::Filled
                } else {
                    OrderState::PartiallyFilled
                };
                reports.push(Self::report_for(&order, taker_state, constraints, None, ts));

                for fill in &outcome.fills {
                    if let Some(maker) = &fill.maker {
                        let maker_state = if maker.is_fully_filled() {
                            OrderState::Filled
                        } else {
                            OrderState::PartiallyFilled
                        };
                        reports.push(Self::report_for(maker, maker_state, constraints, None, ts));
                        if maker.is_fully_filled() {
                            market.orders.remove(&maker.exchange_order_id);
                        }
                    }
                }
            }
            fills = outcome.fills;
        }

        if order.remaining() > QTY_EPSILON {
            match tif {
                TimeInForce::Ioc => reports.push(Self::report_for(
                    &order,
                    OrderState::Cancelled,
                    constraints,
                    Some("IOC remainder cancelled".to_string()),
                    ts,
                )),
                TimeInForce::Fok => reports.push(Self::report_for(
                    &order,
                    OrderState::Cancelled,
                    constraints,
                    Some("FOK remainder cancelled".to_string()),
                    ts,
                )),
                TimeInForce::Gtc | TimeInForce::PostOnly => {
                    market.book.rest(order.clone());
                    market
                        .orders
                        .insert(order.exchange_order_id.clone(), order.clone());
                }
            }
        }

        let last_price = market.last_price;
        let book_levels = self.config.book_levels;
        let changes = market.book.recenter(constraints, last_price, book_levels);
        market.pending_diff.extend(changes);

        ExecOutcome::Accepted {
            reports,
            fills,
            side,
        }
    }

    /// Build a lifecycle report from a live order.
    pub(crate) fn report_for(
        order: &ActiveOrder,
        state: OrderState,
        constraints: &InstrumentConstraints,
        reject_reason: Option<String>,
        ts: DateTime<Utc>,
    ) -> ExecReportPayload {
        let filled = order.filled();
        let avg_fill_price = order.avg_fill_price();
        // Market orders report their average fill price once filled.
        let price = if order.kind == OrderKind::Market && filled > QTY_EPSILON {
            avg_fill_price
        } else {
            order.limit_price
        };
        ExecReportPayload {
            client_order_id: order.client_order_id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            state,
            side: order.side.as_str().to_string(),
            order_type: order.kind.as_str().to_string(),
            time_in_force: order.time_in_force.as_str().to_string(),
            price: constraints.format_price(price),
            quantity: constraints.format_quantity(order.quantity),
            filled: constraints.format_quantity(filled),
            remaining: constraints.format_quantity(order.remaining()),
            avg_fill_price: constraints.format_price(avg_fill_price),
            timestamp: ts,
            reject_reason,
        }
    }

    fn rejection_report(
        request: &OrderRequest,
        constraints: Option<&InstrumentConstraints>,
        ts: DateTime<Utc>,
        reason: &str,
    ) -> ExecReportPayload {
        let zero_qty = constraints.map_or_else(|| "0".to_string(), |c| c.format_quantity(0.0));
        let zero_price = constraints.map_or_else(|| "0".to_string(), |c| c.format_price(0.0));
        ExecReportPayload {
            client_order_id: request.client_order_id.trim().to_string(),
            exchange_order_id: String::new(),
            state: OrderState::Rejected,
            side: request.side.trim().to_uppercase(),
            order_type: request.order_type.trim().to_uppercase(),
            time_in_force: TimeInForce::parse(&request.time_in_force).as_str().to_string(),
            price: request.price.clone().unwrap_or_default(),
            quantity: request.quantity.trim().to_string(),
            filled: zero_qty,
            remaining: request.quantity.trim().to_string(),
            avg_fill_price: zero_price,
            timestamp: ts,
            reject_reason: Some(reason.to_string()),
        }
    }

    async fn reject(
        &self,
        request: &OrderRequest,
        symbol: &str,
        constraints: Option<&InstrumentConstraints>,
        ts: DateTime<Utc>,
        reason: &str,
        started: std::time::Instant,
    ) {
        debug!(symbol, reason, "rejecting order");
        metrics::counter!(
            "venue_orders_rejected_total",
            "environment" => self.config.environment.clone(),
            "provider" => self.config.name.clone(),
            "symbol" => symbol.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);

        let report = Self::rejection_report(request, constraints, ts, reason);
        let root = self.emitter.cancellation().clone();
        self.emit_exec_report(&root, symbol, ts, report).await;

        metrics::histogram!(
            "venue_order_handle_ms",
            "environment" => self.config.environment.clone(),
            "provider" => self.config.name.clone(),
            "symbol" => symbol.to_string(),
            "result" => "rejected"
        )
        .record(started.elapsed().as_secs_f64() * 1000.0);
    }

    pub(crate) async fn emit_exec_report(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        ts: DateTime<Utc>,
        report: ExecReportPayload,
    ) {
        self.emitter
            .emit_with_cancel(cancel, EventType::ExecReport, symbol, ts, |_| {
                EventPayload::Exec(report)
            })
            .await;
    }

    pub(crate) async fn emit_balance(
        &self,
        cancel: &CancellationToken,
        currency: &str,
        balance: BalanceState,
        ts: DateTime<Utc>,
    ) {
        let payload = BalancePayload {
            currency: currency.to_string(),
            total: format_balance(balance.total),
            available: format_balance(balance.available),
            timestamp: ts,
        };
        self.emitter
            .emit_with_cancel(cancel, EventType::BalanceUpdate, currency, ts, |_| {
                EventPayload::Balance(payload)
            })
            .await;
    }
}
