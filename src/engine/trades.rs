//! Autonomous trade generation.
//!
//! The trade producer samples a side and quantity, walks the book with no
//! price limit, and falls back to a model-sampled price when the book is
//! empty. Resting user orders crossed by the walk get their own execution
//! reports and balance settlement.

use super::submit::OrderEngine;
use crate::events::payloads::{EventPayload, ExecReportPayload, TradePayload};
use crate::events::EventType;
use crate::instrument::CatalogueEntry;
use crate::market::depth::{Fill, OrderState, Side, QTY_EPSILON};
use crate::market::state::lock_state;
use crate::utils::now_utc;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct TradeSample {
    payload: TradePayload,
    maker_reports: Vec<ExecReportPayload>,
    maker_fills: Vec<Fill>,
}

impl OrderEngine {
    /// Run one autonomous trade for an instrument and emit everything that
    /// follows from it (trade event, maker reports, balance updates).
    pub(crate) async fn emit_trade(&self, cancel: &CancellationToken, entry: &CatalogueEntry) {
        let ts = now_utc();
        let symbol = entry.instrument.symbol.clone();
        let sample = self.sample_trade(entry, ts);

        let mut balance_updates = Vec::new();
        for fill in &sample.maker_fills {
            if let Some(maker) = &fill.maker {
                balance_updates.extend(self.ledger.apply_fill(
                    &entry.instrument.base_currency,
                    &entry.instrument.quote_currency,
                    maker.side,
                    fill.quantity,
                    fill.price,
                ));
            }
        }

        let payload = sample.payload;
        self.emitter
            .emit_with_cancel(cancel, EventType::Trade, &symbol, ts, |_| {
                EventPayload::Trade(payload)
            })
            .await;
        for report in sample.maker_reports {
            self.emit_exec_report(cancel, &symbol, ts, report).await;
        }
        for (currency, balance) in balance_updates {
            self.emit_balance(cancel, &currency, balance, ts).await;
        }
    }

    /// The locked portion: sample, consume, update market stats.
    fn sample_trade(&self, entry: &CatalogueEntry, ts: DateTime<Utc>) -> TradeSample {
        let constraints = &entry.constraints;
        let side = if self.rng.coin() { Side::Buy } else { Side::Sell };
        let sampled = self
            .rng
            .range_f64(self.config.trade_min, self.config.trade_max)
            .clamp(constraints.min_quantity, constraints.max_quantity);
        let quantity = constraints
            .normalize_quantity(sampled)
            .max(constraints.min_quantity);

        let state_arc = self.market.state_for(entry);
        let mut market = lock_state(&state_arc);

        let outcome = market
            .book
            .consume_liquidity(constraints, side, quantity, 0.0, ts);
        let (price, filled, fills) = if outcome.filled > QTY_EPSILON {
            (outcome.avg_price, outcome.filled, outcome.fills)
        } else {
            // Empty book: synthesize a price with no book impact.
            let sampled_price = self.rng.next_price(
                &self.config.price_model,
                market.last_price,
                market.base_price,
            );
            (constraints.normalize_price(sampled_price), quantity, Vec::new())
        };

        market.last_price = price;
        market.volume_24h += filled;
        let interval = self.config.kline_interval;
        market.klines.update(ts, price, filled, interval);

        let mut maker_reports = Vec::new();
        for fill in &fills {
            if let Some(maker) = &fill.maker {
                let state = if maker.is_fully_filled() {
                    OrderState::Filled
                } else {
                    OrderState::PartiallyFilled
                };
                maker_reports.push(Self::report_for(maker, state, constraints, None, ts));
                if maker.is_fully_filled() {
                    market.orders.remove(&maker.exchange_order_id);
                }
            }
        }

        TradeSample {
            payload: TradePayload {
                trade_id: Uuid::new_v4().to_string(),
                price: constraints.format_price(price),
                quantity: constraints.format_quantity(filled),
                side,
                timestamp: ts,
            },
            maker_reports,
            maker_fills: fills,
        }
    }
}
