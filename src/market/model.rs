//! Geometric random-walk price model and the shared seeded PRNG.
//!
//! Every random draw in the simulator (price shocks, trade sizing, venue
//! gates, balance perturbation) goes through [`SharedRng`], a single
//! `StdRng` behind one mutex. Under a fixed seed the entire emission
//! sequence is deterministic; splitting into per-component streams would
//! require splitting seeds explicitly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Parameters of the per-tick price walk.
#[derive(Debug, Clone, Copy)]
pub struct PriceModelParams {
    /// Per-sample relative drift
    pub drift: f64,
    /// Per-sample relative volatility applied to a standard normal draw
    pub volatility: f64,
    /// Probability of an additional shock on a given sample
    pub shock_probability: f64,
    /// Shock size relative to the last price; sign is fair
    pub shock_magnitude: f64,
}

impl Default for PriceModelParams {
    fn default() -> Self {
        Self {
            drift: 2.5e-4,
            volatility: 1.25e-2,
            shock_probability: 0.045,
            shock_magnitude: 0.02,
        }
    }
}

/// A seedable PRNG shared by every sampling site.
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    /// Create from an optional seed; `None` seeds from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StdRng> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Sample the next price from the last one:
    /// `P = L + L·drift + L·volatility·N(0,1) + shock`.
    ///
    /// The shock term is `±shock_magnitude·L` with probability
    /// `shock_probability`, sign fair. A non-positive result falls back to
    /// `base_price`.
    pub fn next_price(&self, params: &PriceModelParams, last: f64, base_price: f64) -> f64 {
        let mut rng = self.lock();
        let noise: f64 = rng.sample(StandardNormal);
        let mut next = last + last * params.drift + last * params.volatility * noise;
        if rng.random_bool(params.shock_probability.clamp(0.0, 1.0)) {
            let shock = params.shock_magnitude * last;
            next += if rng.random_bool(0.5) { shock } else { -shock };
        }
        if next <= 0.0 { base_price } else { next }
    }

    /// Uniform draw from `[low, high)`; returns `low` when the range is
    /// empty or inverted.
    pub fn range_f64(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.lock().random_range(low..high)
    }

    /// Uniform index draw from `0..len`; `None` when `len` is zero.
    pub fn index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.lock().random_range(0..len))
    }

    /// Bernoulli draw; probabilities outside `[0, 1]` are clamped.
    pub fn chance(&self, probability: f64) -> bool {
        self.lock().random_bool(probability.clamp(0.0, 1.0))
    }

    /// Fair coin.
    pub fn coin(&self) -> bool {
        self.lock().random_bool(0.5)
    }

    /// Uniform duration draw from `[min, max]`.
    pub fn duration_between(&self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let low = min.as_nanos() as u64;
        let high = max.as_nanos() as u64;
        Duration::from_nanos(self.lock().random_range(low..=high))
    }
}
