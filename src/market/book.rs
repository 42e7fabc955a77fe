//! The per-instrument tick book.
//!
//! Two `BTreeMap<PriceTick, BookDepth>` sides, only ever touched under the
//! owning instrument's lock. Synthetic (house) liquidity keeps the book
//! alive between user orders; matching consumes user FIFO first, then
//! synthetic, walking levels in price-priority order.

use super::depth::{
    ActiveOrder, BookDepth, ConsumeOutcome, Fill, LevelChange, PriceTick, Side, QTY_EPSILON,
};
use super::model::SharedRng;
use crate::instrument::InstrumentConstraints;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Price comparison tolerance for limit checks.
const PRICE_EPSILON: f64 = 1e-9;

/// Relative size of a single synthetic-depth mutation.
const MUTATION_FRACTION: f64 = 0.2;

/// A two-sided order book keyed by integer price ticks.
#[derive(Debug, Default)]
pub struct TickBook {
    bids: BTreeMap<PriceTick, BookDepth>,
    asks: BTreeMap<PriceTick, BookDepth>,
}

impl TickBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    fn side_map(&self, side: Side) -> &BTreeMap<PriceTick, BookDepth> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_map_mut(&mut self, side: Side) -> &mut BTreeMap<PriceTick, BookDepth> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn seed_quantity(constraints: &InstrumentConstraints, step: i64) -> f64 {
        constraints.quantity_increment.max(0.1) + step as f64 * 0.01
    }

    /// Populate `levels` synthetic levels on each side around `last_price`.
    pub fn seed(&mut self, constraints: &InstrumentConstraints, last_price: f64, levels: usize) {
        let mid = constraints.tick_for_price(last_price);
        for step in 1..=levels as i64 {
            let quantity = Self::seed_quantity(constraints, step);
            let bid_tick = mid - step;
            if bid_tick > 0 {
                self.bids.insert(bid_tick, BookDepth::synthetic(quantity));
            }
            self.asks.insert(mid + step, BookDepth::synthetic(quantity));
        }
    }

    /// Randomly adjust synthetic depth on up to `max_width` levels per side,
    /// then recenter. Returns every level change for delta emission.
    pub fn mutate(
        &mut self,
        rng: &SharedRng,
        constraints: &InstrumentConstraints,
        last_price: f64,
        levels: usize,
        max_width: usize,
    ) -> Vec<LevelChange> {
        let mut changes = Vec::new();
        for side in [Side::Buy, Side::Sell] {
            let ticks: Vec<PriceTick> = self.side_map(side).keys().copied().collect();
            for _ in 0..max_width {
                let Some(index) = rng.index(ticks.len()) else {
                    break;
                };
                let tick = ticks[index];
                let grow = rng.coin();
                let map = self.side_map_mut(side);
                let Some(depth) = map.get_mut(&tick) else {
                    continue;
                };
                let delta = MUTATION_FRACTION * depth.synthetic;
                if delta <= QTY_EPSILON {
                    continue;
                }
                depth.synthetic += if grow { delta } else { -delta };
                if depth.synthetic < QTY_EPSILON {
                    depth.synthetic = 0.0;
                }
                let quantity = depth.total();
                if depth.is_empty() {
                    map.remove(&tick);
                }
                changes.push(LevelChange {
                    side,
                    tick,
                    quantity,
                });
            }
        }
        changes.extend(self.recenter(constraints, last_price, levels));
        changes
    }

    /// Top up either side until it holds `levels` populated ticks, stepping
    /// outward from the mid. Returns the added levels.
    pub fn recenter(
        &mut self,
        constraints: &InstrumentConstraints,
        last_price: f64,
        levels: usize,
    ) -> Vec<LevelChange> {
        let mid = constraints.tick_for_price(last_price);
        let mut changes = Vec::new();
        for side in [Side::Buy, Side::Sell] {
            let map = self.side_map_mut(side);
            let mut populated = map.values().filter(|d| !d.is_empty()).count();
            let mut step: i64 = 1;
            while populated < levels {
                let tick = match side {
                    Side::Buy => mid - step,
                    Side::Sell => mid + step,
                };
                if side == Side::Buy && tick <= 0 {
                    break;
                }
                if !map.contains_key(&tick) {
                    let quantity = Self::seed_quantity(constraints, step);
                    map.insert(tick, BookDepth::synthetic(quantity));
                    changes.push(LevelChange {
                        side,
                        tick,
                        quantity,
                    });
                    populated += 1;
                }
                step += 1;
            }
        }
        changes
    }

    /// Best-first `(price, quantity)` pairs for up to `limit` non-empty
    /// levels of one side.
    pub fn snapshot(
        &self,
        constraints: &InstrumentConstraints,
        side: Side,
        limit: usize,
    ) -> Vec<(f64, f64)> {
        let map = self.side_map(side);
        let iter: Box<dyn Iterator<Item = (&PriceTick, &BookDepth)>> = match side {
            Side::Buy => Box::new(map.iter().rev()),
            Side::Sell => Box::new(map.iter()),
        };
        iter.filter(|(_, depth)| !depth.is_empty())
            .take(limit)
            .map(|(tick, depth)| (constraints.price_for_tick(*tick), depth.total()))
            .collect()
    }

    fn best_tick(&self, side: Side) -> Option<PriceTick> {
        let map = self.side_map(side);
        match side {
            Side::Buy => map
                .iter()
                .rev()
                .find(|(_, d)| !d.is_empty())
                .map(|(t, _)| *t),
            Side::Sell => map.iter().find(|(_, d)| !d.is_empty()).map(|(t, _)| *t),
        }
    }

    /// Highest populated bid price.
    pub fn best_bid(&self, constraints: &InstrumentConstraints) -> Option<f64> {
        self.best_tick(Side::Buy)
            .map(|t| constraints.price_for_tick(t))
    }

    /// Lowest populated ask price.
    pub fn best_ask(&self, constraints: &InstrumentConstraints) -> Option<f64> {
        self.best_tick(Side::Sell)
            .map(|t| constraints.price_for_tick(t))
    }

    /// Whether a limit order at `limit_price` would cross the opposite best.
    pub fn is_marketable(
        &self,
        constraints: &InstrumentConstraints,
        side: Side,
        limit_price: f64,
    ) -> bool {
        match side {
            Side::Buy => self
                .best_ask(constraints)
                .is_some_and(|ask| limit_price + PRICE_EPSILON >= ask),
            Side::Sell => self
                .best_bid(constraints)
                .is_some_and(|bid| limit_price - PRICE_EPSILON <= bid),
        }
    }

    /// Total opposite-side depth whose price respects `limit_price`
    /// (`0` means unconstrained).
    pub fn available_liquidity(
        &self,
        constraints: &InstrumentConstraints,
        side: Side,
        limit_price: f64,
    ) -> f64 {
        let opposite = self.side_map(side.opposite());
        opposite
            .iter()
            .filter(|(tick, depth)| {
                if depth.is_empty() {
                    return false;
                }
                if limit_price <= 0.0 {
                    return true;
                }
                let price = constraints.price_for_tick(**tick);
                match side {
                    Side::Buy => price <= limit_price + PRICE_EPSILON,
                    Side::Sell => price >= limit_price - PRICE_EPSILON,
                }
            })
            .map(|(_, depth)| depth.total())
            .sum()
    }

    /// Greedy price-priority walk of the opposite side.
    ///
    /// At each level, user orders are consumed FIFO first (each consumed
    /// order recorded as a [`Fill`] with its maker), then synthetic depth.
    /// Fully-filled user orders leave their level; dead levels leave the
    /// book. Stops once `quantity` is filled or no marketable depth remains.
    pub fn consume_liquidity(
        &mut self,
        constraints: &InstrumentConstraints,
        side: Side,
        quantity: f64,
        limit_price: f64,
        ts: DateTime<Utc>,
    ) -> ConsumeOutcome {
        let ticks: Vec<PriceTick> = match side {
            Side::Buy => self.asks.keys().copied().collect(),
            Side::Sell => self.bids.keys().copied().rev().collect(),
        };

        let mut filled = 0.0;
        let mut notional = 0.0;
        let mut fills: Vec<Fill> = Vec::new();

        for tick in ticks {
            if filled + QTY_EPSILON >= quantity {
                break;
            }
            let price = constraints.price_for_tick(tick);
            if limit_price > 0.0 {
                let beyond = match side {
                    Side::Buy => price > limit_price + PRICE_EPSILON,
                    Side::Sell => price < limit_price - PRICE_EPSILON,
                };
                if beyond {
                    break;
                }
            }

            let map = self.side_map_mut(side.opposite());
            let Some(depth) = map.get_mut(&tick) else {
                continue;
            };

            // User liquidity first, FIFO within the level.
            let mut index = 0;
            while index < depth.orders.len() && filled + QTY_EPSILON < quantity {
                let order = depth.orders[index].clone();
                let open = order.remaining();
                if open <= QTY_EPSILON {
                    depth.orders.remove(index);
                    continue;
                }
                let take = (quantity - filled).min(open);
                order.apply_fill(take, price, ts);
                filled += take;
                notional += take * price;
                fills.push(Fill {
                    price,
                    quantity: take,
                    maker: Some(order.clone()),
                });
                if order.is_fully_filled() {
                    depth.orders.remove(index);
                } else {
                    index += 1;
                }
            }

            // Then synthetic.
            if filled + QTY_EPSILON < quantity && depth.synthetic > QTY_EPSILON {
                let take = (quantity - filled).min(depth.synthetic);
                depth.synthetic -= take;
                if depth.synthetic < QTY_EPSILON {
                    depth.synthetic = 0.0;
                }
                filled += take;
                notional += take * price;
                fills.push(Fill {
                    price,
                    quantity: take,
                    maker: None,
                });
            }

            if depth.is_empty() {
                map.remove(&tick);
            }
        }

        trace!(side = %side, quantity, filled, "liquidity walk");
        ConsumeOutcome {
            avg_price: if filled > QTY_EPSILON {
                notional / filled
            } else {
                0.0
            },
            filled,
            fills,
        }
    }

    /// Rest an order on its own side at its price tick (FIFO append).
    pub fn rest(&mut self, order: Arc<ActiveOrder>) {
        let tick = order.tick;
        self.side_map_mut(order.side)
            .entry(tick)
            .or_default()
            .orders
            .push(order);
    }

    /// Number of populated levels on a side.
    pub fn level_count(&self, side: Side) -> usize {
        self.side_map(side)
            .values()
            .filter(|d| !d.is_empty())
            .count()
    }

    /// Whether an order with `exchange_order_id` rests at `tick` on `side`.
    pub fn contains_order(&self, side: Side, tick: PriceTick, exchange_order_id: &str) -> bool {
        self.side_map(side)
            .get(&tick)
            .is_some_and(|depth| {
                depth
                    .orders
                    .iter()
                    .any(|o| o.exchange_order_id == exchange_order_id)
            })
    }

    /// Total depth at one tick, zero when absent.
    pub fn depth_at(&self, side: Side, tick: PriceTick) -> f64 {
        self.side_map(side).get(&tick).map_or(0.0, |d| d.total())
    }
}
