//! Simulated venue behaviour: injected latency, transient errors, and
//! stochastic disconnect windows.
//!
//! Every emission path runs the same three gates before producing a
//! payload, so the whole instance degrades uniformly when the simulated
//! venue misbehaves.

use crate::market::model::SharedRng;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Tunables for the behaviour gates.
#[derive(Debug, Clone, Copy)]
pub struct VenueBehaviourParams {
    /// Lower bound of injected latency
    pub latency_min: Duration,
    /// Upper bound of injected latency
    pub latency_max: Duration,
    /// Probability of entering a disconnect window on an operational check
    pub disconnect_chance: f64,
    /// Length of a disconnect window
    pub disconnect_for: Duration,
    /// Probability of a transient error on an emission
    pub transient_error: f64,
}

impl Default for VenueBehaviourParams {
    fn default() -> Self {
        Self {
            latency_min: Duration::from_millis(5),
            latency_max: Duration::from_millis(20),
            disconnect_chance: 0.005,
            disconnect_for: Duration::from_secs(3),
            transient_error: 0.01,
        }
    }
}

impl VenueBehaviourParams {
    /// Parameters with every stochastic disruption disabled and zero
    /// latency. Deterministic tests run the gates without noise.
    pub fn quiet() -> Self {
        Self {
            latency_min: Duration::ZERO,
            latency_max: Duration::ZERO,
            disconnect_chance: 0.0,
            disconnect_for: Duration::ZERO,
            transient_error: 0.0,
        }
    }
}

/// Result of the latency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The wait elapsed; continue with the emission
    Proceed,
    /// The context was cancelled during the wait; abort silently
    Aborted,
}

/// Result of the operational gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationalStatus {
    /// Venue is up
    Operational,
    /// Venue is inside a disconnect window. `notice` carries the message to
    /// put on the error channel when the window was just entered; re-checks
    /// during an ongoing window stay silent.
    Disconnected {
        /// Error-channel message for a fresh disconnect
        notice: Option<String>,
    },
}

#[derive(Debug)]
struct Health {
    disconnected: bool,
    reconnect_at: Option<Instant>,
}

/// The three venue gates, sharing the instance PRNG.
pub struct VenueBehaviour {
    provider: String,
    params: VenueBehaviourParams,
    rng: Arc<SharedRng>,
    health: Mutex<Health>,
}

impl VenueBehaviour {
    /// Create the gates for one instance.
    pub fn new(provider: String, params: VenueBehaviourParams, rng: Arc<SharedRng>) -> Self {
        Self {
            provider,
            params,
            rng,
            health: Mutex::new(Health {
                disconnected: false,
                reconnect_at: None,
            }),
        }
    }

    fn health(&self) -> MutexGuard<'_, Health> {
        match self.health.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Sleep a uniform random duration in `[latency_min, latency_max]`,
    /// racing the given context.
    pub async fn latency_gate(&self, cancel: &CancellationToken) -> GateOutcome {
        let wait = self
            .rng
            .duration_between(self.params.latency_min, self.params.latency_max);
        if wait.is_zero() {
            return GateOutcome::Proceed;
        }
        tokio::select! {
            _ = cancel.cancelled() => GateOutcome::Aborted,
            _ = tokio::time::sleep(wait) => GateOutcome::Proceed,
        }
    }

    /// Check (and possibly flip) the disconnect state.
    ///
    /// An elapsed window clears on the next check; a fresh disconnect
    /// schedules its reconnect time and carries a notice for the error
    /// channel.
    pub fn operational_gate(&self) -> OperationalStatus {
        let now = Instant::now();
        let mut health = self.health();

        if health.disconnected {
            match health.reconnect_at {
                Some(reconnect_at) if now <= reconnect_at => {
                    return OperationalStatus::Disconnected { notice: None };
                }
                _ => {
                    health.disconnected = false;
                    health.reconnect_at = None;
                    debug!(provider = %self.provider, "venue reconnected");
                }
            }
        }

        if self.rng.chance(self.params.disconnect_chance) {
            health.disconnected = true;
            health.reconnect_at = Some(now + self.params.disconnect_for);
            warn!(
                provider = %self.provider,
                window = ?self.params.disconnect_for,
                "venue entering disconnect window"
            );
            metrics::counter!(
                "venue_disruptions_total",
                "provider" => self.provider.clone(),
                "kind" => "disconnect"
            )
            .increment(1);
            return OperationalStatus::Disconnected {
                notice: Some(format!(
                    "venue temporarily unavailable for {:?}",
                    self.params.disconnect_for
                )),
            };
        }

        OperationalStatus::Operational
    }

    /// Roll the transient-error gate. `Some` carries the message to emit
    /// instead of the intended payload.
    pub fn transient_gate(&self) -> Option<String> {
        if self.rng.chance(self.params.transient_error) {
            metrics::counter!(
                "venue_disruptions_total",
                "provider" => self.provider.clone(),
                "kind" => "transient"
            )
            .increment(1);
            Some("simulated transient venue error".to_string())
        } else {
            None
        }
    }
}
