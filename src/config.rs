//! Simulator configuration.
//!
//! Instances are constructed from a loosely-typed `map<string, value>` the
//! dispatcher hands to the factory. Durations accept either the standard
//! `<number><unit>` form (`"250ms"`, `"2s"`, `"30m"`) or a bare integer
//! meaning seconds.

use crate::error::VenueError;
use crate::market::model::PriceModelParams;
use crate::venue::VenueBehaviourParams;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Default provider display name.
pub const DEFAULT_NAME: &str = "fake";

/// Default capacity of the bounded events channel.
pub const DEFAULT_EVENTS_CAPACITY: usize = 128;

/// Default capacity of the non-blocking errors channel.
pub const DEFAULT_ERRORS_CAPACITY: usize = 128;

/// Default capacity of the inbound order queue.
pub const DEFAULT_ORDER_QUEUE_CAPACITY: usize = 64;

/// All tunables of a simulator instance.
///
/// Only a handful of keys are accepted from the config map (see
/// [`SimulatorConfig::from_map`]); everything else keeps its documented
/// default and can be adjusted programmatically before construction.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Display name reported by the instance and stamped on event ids.
    pub name: String,
    /// PRNG seed; `None` seeds from the OS. A fixed seed makes the whole
    /// emission sequence deterministic.
    pub seed: Option<u64>,
    /// Cadence of ticker emissions per instrument.
    pub ticker_interval: Duration,
    /// Cadence of autonomous trade emissions per instrument.
    pub trade_interval: Duration,
    /// Cadence of full book snapshots.
    pub book_snapshot_interval: Duration,
    /// Cadence of book delta emissions between snapshots.
    pub book_diff_interval: Duration,
    /// Kline aggregation window and emission cadence.
    pub kline_interval: Duration,
    /// Cadence of autonomous balance refresh emissions.
    pub balance_update_interval: Duration,
    /// Cadence of catalogue refresh from the instrument source.
    pub instrument_refresh_interval: Duration,
    /// Number of populated price levels maintained on each book side.
    pub book_levels: usize,
    /// Upper bound on levels touched per side in one book mutation.
    pub max_mutation_width: usize,
    /// Lower bound of the sampled autonomous trade quantity.
    pub trade_min: f64,
    /// Upper bound of the sampled autonomous trade quantity.
    pub trade_max: f64,
    /// Random-walk parameters for the price model.
    pub price_model: PriceModelParams,
    /// Latency / disconnect / transient-error behaviour.
    pub venue: VenueBehaviourParams,
    /// Bounded events channel capacity (blocking send, backpressure).
    pub events_capacity: usize,
    /// Bounded errors channel capacity (non-blocking send, drop on full).
    pub errors_capacity: usize,
    /// Bounded inbound order queue capacity.
    pub order_queue_capacity: usize,
    /// Starting price per symbol; symbols not listed start at
    /// [`SimulatorConfig::FALLBACK_BASE_PRICE`].
    pub base_prices: HashMap<String, f64>,
    /// Environment label attached to metrics.
    pub environment: String,
}

impl SimulatorConfig {
    /// Base price used for symbols without an entry in `base_prices`.
    pub const FALLBACK_BASE_PRICE: f64 = 100.0;

    /// Build a config from the factory's raw key/value map.
    ///
    /// Recognised keys: `name`, `ticker_interval`, `trade_interval`,
    /// `book_snapshot_interval`, `book_diff_interval`, `kline_interval`,
    /// `balance_update_interval`, `instrument_refresh_interval`, `seed`.
    /// Unknown keys are ignored so dispatcher-level settings can share the
    /// same map.
    ///
    /// # Errors
    /// [`VenueError::InvalidConfig`] when a recognised key holds a value
    /// that cannot be interpreted.
    pub fn from_map(map: &HashMap<String, Value>) -> Result<Self, VenueError> {
        let mut config = Self::default();

        if let Some(value) = map.get("name") {
            match value.as_str() {
                Some(name) if !name.trim().is_empty() => config.name = name.trim().to_string(),
                _ => {
                    return Err(VenueError::InvalidConfig {
                        key: "name".to_string(),
                        message: "expected a non-empty string".to_string(),
                    });
                }
            }
        }

        if let Some(value) = map.get("seed") {
            config.seed = Some(value.as_u64().ok_or_else(|| VenueError::InvalidConfig {
                key: "seed".to_string(),
                message: "expected an unsigned integer".to_string(),
            })?);
        }

        let durations: [(&str, &mut Duration); 7] = [
            ("ticker_interval", &mut config.ticker_interval),
            ("trade_interval", &mut config.trade_interval),
            ("book_snapshot_interval", &mut config.book_snapshot_interval),
            ("book_diff_interval", &mut config.book_diff_interval),
            ("kline_interval", &mut config.kline_interval),
            (
                "balance_update_interval",
                &mut config.balance_update_interval,
            ),
            (
                "instrument_refresh_interval",
                &mut config.instrument_refresh_interval,
            ),
        ];
        for (key, slot) in durations {
            if let Some(value) = map.get(key) {
                *slot = parse_duration_value(key, value)?;
            }
        }

        Ok(config)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            seed: None,
            ticker_interval: Duration::from_secs(1),
            trade_interval: Duration::from_millis(1500),
            book_snapshot_interval: Duration::from_secs(2),
            book_diff_interval: Duration::from_millis(500),
            kline_interval: Duration::from_secs(60),
            balance_update_interval: Duration::from_secs(5),
            instrument_refresh_interval: Duration::from_secs(30 * 60),
            book_levels: 10,
            max_mutation_width: 3,
            trade_min: 0.05,
            trade_max: 0.75,
            price_model: PriceModelParams::default(),
            venue: VenueBehaviourParams::default(),
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            errors_capacity: DEFAULT_ERRORS_CAPACITY,
            order_queue_capacity: DEFAULT_ORDER_QUEUE_CAPACITY,
            base_prices: default_base_prices(),
            environment: "sim".to_string(),
        }
    }
}

fn default_base_prices() -> HashMap<String, f64> {
    HashMap::from([
        ("BTC-USDT".to_string(), 50_000.0),
        ("ETH-USDT".to_string(), 2_500.0),
        ("SOL-USDT".to_string(), 150.0),
    ])
}

/// Interpret a config value as a duration.
///
/// Strings go through `humantime` (`"250ms"`, `"1h 30m"`); bare integers are
/// seconds.
fn parse_duration_value(key: &str, value: &Value) -> Result<Duration, VenueError> {
    match value {
        Value::String(s) => humantime::parse_duration(s.trim()).map_err(|e| {
            VenueError::InvalidConfig {
                key: key.to_string(),
                message: e.to_string(),
            }
        }),
        Value::Number(n) => n
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| VenueError::InvalidConfig {
                key: key.to_string(),
                message: "expected whole seconds".to_string(),
            }),
        other => Err(VenueError::InvalidConfig {
            key: key.to_string(),
            message: format!("cannot interpret {other} as a duration"),
        }),
    }
}
