//! Per-currency balance bookkeeping.

use crate::market::depth::Side;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Starting balance handed to a currency on first touch.
const DEFAULT_TOTAL: f64 = 10_000.0;

/// Balance for one currency. `0 ≤ available ≤ total` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceState {
    /// Total holdings, never negative
    pub total: f64,
    /// Spendable holdings, clamped to `[0, total]`
    pub available: f64,
}

impl Default for BalanceState {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL,
            available: DEFAULT_TOTAL,
        }
    }
}

/// Currency-keyed balances behind a single lock.
pub struct BalanceLedger {
    accounts: Mutex<HashMap<String, BalanceState>>,
}

impl BalanceLedger {
    /// An empty ledger; currencies materialize with the default balance on
    /// first touch.
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, BalanceState>> {
        match self.accounts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply a mutation atomically and return the clamped result.
    pub fn update(&self, currency: &str, f: impl FnOnce(&mut BalanceState)) -> BalanceState {
        let mut accounts = self.accounts();
        let state = accounts.entry(currency.to_string()).or_default();
        f(state);
        if state.total < 0.0 {
            state.total = 0.0;
        }
        state.available = state.available.clamp(0.0, state.total);
        *state
    }

    /// Current balance for a currency, if it has ever been touched.
    pub fn get(&self, currency: &str) -> Option<BalanceState> {
        self.accounts().get(currency).copied()
    }

    /// Every currency the ledger tracks.
    pub fn currencies(&self) -> Vec<String> {
        self.accounts().keys().cloned().collect()
    }

    /// Settle one fill: a Buy debits `quantity × price` quote and credits
    /// `quantity` base; a Sell reverses. Returns the two updated balances
    /// in settlement order for event emission.
    pub fn apply_fill(
        &self,
        base_currency: &str,
        quote_currency: &str,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> Vec<(String, BalanceState)> {
        let notional = quantity * price;
        let (base_delta, quote_delta) = match side {
            Side::Buy => (quantity, -notional),
            Side::Sell => (-quantity, notional),
        };
        vec![
            (
                base_currency.to_string(),
                self.update(base_currency, |b| {
                    b.total += base_delta;
                    b.available += base_delta;
                }),
            ),
            (
                quote_currency.to_string(),
                self.update(quote_currency, |b| {
                    b.total += quote_delta;
                    b.available += quote_delta;
                }),
            ),
        ]
    }
}

impl Default for BalanceLedger {
    fn default() -> Self {
        Self::new()
    }
}
