//! Event emission: sequence numbers, pool borrows, bounded channel sends.

use super::payloads::EventPayload;
use super::pool::EventPool;
use super::{Event, EventType};
use crate::error::VenueError;
use crate::utils::now_utc;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Emits canonical events onto the bounded events channel.
///
/// Sequences are monotonic per `(event type, symbol)` starting at 1. The
/// events channel send blocks (backpressure throttles producers); the error
/// channel never blocks and discards when full. Both channels close exactly
/// once when [`EventEmitter::close_channels`] runs after every producer has
/// exited.
pub struct EventEmitter {
    provider: String,
    environment: String,
    pool: Arc<dyn EventPool>,
    events_tx: Mutex<Option<mpsc::Sender<Box<Event>>>>,
    errors_tx: Mutex<Option<mpsc::Sender<VenueError>>>,
    sequences: Mutex<HashMap<(EventType, String), u64>>,
    root: CancellationToken,
}

impl EventEmitter {
    /// Wire an emitter to its channels, pool and root context.
    pub fn new(
        provider: String,
        environment: String,
        pool: Arc<dyn EventPool>,
        events_tx: mpsc::Sender<Box<Event>>,
        errors_tx: mpsc::Sender<VenueError>,
        root: CancellationToken,
    ) -> Self {
        Self {
            provider,
            environment,
            pool,
            events_tx: Mutex::new(Some(events_tx)),
            errors_tx: Mutex::new(Some(errors_tx)),
            sequences: Mutex::new(HashMap::new()),
            root,
        }
    }

    /// The provider name stamped onto event ids.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn guard<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Reserve the next sequence number for `(event_type, symbol)`.
    pub fn next_sequence(&self, event_type: EventType, symbol: &str) -> u64 {
        let mut sequences = Self::guard(&self.sequences);
        let counter = sequences
            .entry((event_type, symbol.to_string()))
            .or_insert(0);
        *counter += 1;
        *counter
    }

    /// Borrow, populate and emit one event, racing the instance root
    /// context. Producers with their own child token use
    /// [`EventEmitter::emit_with_cancel`] so a cancelled route never stays
    /// blocked on a full channel.
    pub async fn emit_with<F>(
        &self,
        event_type: EventType,
        symbol: &str,
        ingest_at: DateTime<Utc>,
        build: F,
    ) -> bool
    where
        F: FnOnce(u64) -> EventPayload,
    {
        let root = self.root.clone();
        self.emit_with_cancel(&root, event_type, symbol, ingest_at, build)
            .await
    }

    /// Borrow, populate and emit one event.
    ///
    /// The payload builder receives the reserved sequence number (book
    /// payloads fold it into their checksum). Pool exhaustion and
    /// cancellation of `cancel` during the borrow or the send drop the
    /// payload; the return value says whether the event reached the
    /// channel.
    pub async fn emit_with_cancel<F>(
        &self,
        cancel: &CancellationToken,
        event_type: EventType,
        symbol: &str,
        ingest_at: DateTime<Utc>,
        build: F,
    ) -> bool
    where
        F: FnOnce(u64) -> EventPayload,
    {
        let sequence = self.next_sequence(event_type, symbol);
        let mut event = match self.pool.borrow_event(cancel).await {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, event_type = %event_type, symbol, "event borrow failed, dropping payload");
                self.emit_error(err);
                return false;
            }
        };

        event.id = Event::compose_id(&self.provider, symbol, event_type, sequence);
        event.provider = self.provider.clone();
        event.symbol = symbol.to_string();
        event.event_type = event_type;
        event.sequence = sequence;
        event.ingest_at = ingest_at;
        event.emit_at = now_utc();
        event.payload = build(sequence);

        self.send(cancel, event).await
    }

    async fn send(&self, cancel: &CancellationToken, event: Box<Event>) -> bool {
        let Some(sender) = Self::guard(&self.events_tx).clone() else {
            trace!("events channel closed, dropping event");
            return false;
        };

        metrics::counter!(
            "venue_events_emitted_total",
            "environment" => self.environment.clone(),
            "provider" => self.provider.clone(),
            "symbol" => event.symbol.clone(),
            "type" => event.event_type.as_str()
        )
        .increment(1);

        tokio::select! {
            _ = cancel.cancelled() => {
                trace!("cancelled during send, dropping event");
                false
            }
            sent = sender.send(event) => sent.is_ok(),
        }
    }

    /// The instance root context this emitter races by default.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.root
    }

    /// Put an error on the non-blocking error channel; discards when full
    /// or closed.
    pub fn emit_error(&self, err: VenueError) {
        metrics::counter!(
            "venue_errors_total",
            "environment" => self.environment.clone(),
            "provider" => self.provider.clone(),
            "reason" => err.reason()
        )
        .increment(1);

        let Some(sender) = Self::guard(&self.errors_tx).clone() else {
            return;
        };
        if sender.try_send(err).is_err() {
            trace!("error channel full, discarding");
        }
    }

    /// Drop the channel senders. After the last in-flight send finishes the
    /// receivers observe end-of-stream. Safe to call more than once.
    pub fn close_channels(&self) {
        Self::guard(&self.events_tx).take();
        Self::guard(&self.errors_tx).take();
    }
}
