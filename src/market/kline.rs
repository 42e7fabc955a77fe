//! Rolling OHLCV aggregation.

use crate::utils::truncate_to_interval;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;

/// One OHLCV window. `low ≤ open, close ≤ high` holds after every update.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineWindow {
    /// Inclusive window start
    pub open_time: DateTime<Utc>,
    /// `open_time + interval`
    pub close_time: DateTime<Utc>,
    /// First price of the window
    pub open: f64,
    /// Highest price seen
    pub high: f64,
    /// Lowest price seen
    pub low: f64,
    /// Most recent price
    pub close: f64,
    /// Accumulated traded quantity
    pub volume: f64,
}

impl KlineWindow {
    fn open_at(open_time: DateTime<Utc>, interval: Duration, price: f64) -> Self {
        let close_time = open_time
            + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            open_time,
            close_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }

    fn extend(&mut self, price: f64, quantity: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += quantity;
    }
}

/// The current window plus completed windows awaiting finalization.
#[derive(Debug, Default)]
pub struct KlineTrack {
    current: Option<KlineWindow>,
    completed: VecDeque<KlineWindow>,
}

impl KlineTrack {
    /// An empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a trade (or a zero-quantity price mark) into the track.
    ///
    /// Opens a window aligned to `ts` when none exists. When `ts` lands past
    /// the current window, the window rolls into the completed queue and a
    /// new one opens at the previous close time, carrying the previous close
    /// as its open.
    pub fn update(&mut self, ts: DateTime<Utc>, price: f64, quantity: f64, interval: Duration) {
        let current = self.current.get_or_insert_with(|| {
            KlineWindow::open_at(truncate_to_interval(ts, interval), interval, price)
        });

        while ts > current.close_time {
            let carry = current.close;
            let rolled = current.clone();
            let next = KlineWindow::open_at(rolled.close_time, interval, carry);
            self.completed.push_back(rolled);
            *current = next;
        }

        current.extend(price, quantity);
    }

    /// Drain every window whose close has passed, in open-time order.
    ///
    /// Includes the current window when `now` has reached its close time.
    /// Calling twice without intervening updates yields nothing the second
    /// time.
    pub fn finalize(&mut self, now: DateTime<Utc>, _interval: Duration) -> Vec<KlineWindow> {
        let mut out = Vec::new();
        while self
            .completed
            .front()
            .is_some_and(|window| window.close_time <= now)
        {
            if let Some(window) = self.completed.pop_front() {
                out.push(window);
            }
        }
        if self
            .current
            .as_ref()
            .is_some_and(|window| window.close_time <= now)
        {
            if let Some(window) = self.current.take() {
                out.push(window);
            }
        }
        out
    }

    /// The in-progress window, if any.
    pub fn current(&self) -> Option<&KlineWindow> {
        self.current.as_ref()
    }
}
