//! The venue instance: lifecycle, channels, route table and order queue.

pub mod factory;
pub mod routes;

pub use factory::{register_factory, ProviderFactory, ProviderRegistry, FACTORY_KEY};
pub use routes::{Route, RouteFilter};

use crate::config::SimulatorConfig;
use crate::engine::{BalanceLedger, OrderEngine, OrderRequest};
use crate::error::VenueError;
use crate::events::pool::EventPool;
use crate::events::{canonical_route_type, Event, EventEmitter, EventPayload, EventType};
use crate::instrument::{
    default_instruments, Instrument, InstrumentCatalogue, InstrumentSource,
};
use crate::market::model::SharedRng;
use crate::market::state::MarketState;
use crate::utils::now_utc;
use crate::venue::VenueBehaviour;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

struct RouteHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct OrderEnvelope {
    request: OrderRequest,
    cancel: CancellationToken,
}

/// A running venue simulator.
///
/// Construction wires the channels and seeds the catalogue; [`start`]
/// launches the order consumer and the catalogue refresher; routes come and
/// go through [`subscribe_route`] / [`unsubscribe_route`]. [`shutdown`]
/// cancels everything, waits for every producer to exit, then closes both
/// channels exactly once.
///
/// [`start`]: VenueSimulator::start
/// [`subscribe_route`]: VenueSimulator::subscribe_route
/// [`unsubscribe_route`]: VenueSimulator::unsubscribe_route
/// [`shutdown`]: VenueSimulator::shutdown
pub struct VenueSimulator {
    engine: Arc<OrderEngine>,
    source: Arc<dyn InstrumentSource>,
    routes: tokio::sync::Mutex<HashMap<EventType, RouteHandle>>,
    order_tx: mpsc::Sender<OrderEnvelope>,
    order_rx: Mutex<Option<mpsc::Receiver<OrderEnvelope>>>,
    events_rx: Mutex<Option<mpsc::Receiver<Box<Event>>>>,
    errors_rx: Mutex<Option<mpsc::Receiver<VenueError>>>,
    started: AtomicBool,
    stopped: AtomicBool,
    root: CancellationToken,
    tracker: TaskTracker,
}

impl std::fmt::Debug for VenueSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueSimulator").finish_non_exhaustive()
    }
}

impl VenueSimulator {
    /// Build an instance.
    ///
    /// The catalogue seeds from `source`; a fetch failure or empty result
    /// falls back to the built-in defaults. Construction emits no events.
    pub fn new(
        root: CancellationToken,
        pool: Arc<dyn EventPool>,
        config: SimulatorConfig,
        source: Arc<dyn InstrumentSource>,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(config.events_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(config.errors_capacity);
        let (order_tx, order_rx) = mpsc::channel(config.order_queue_capacity);

        let emitter = Arc::new(EventEmitter::new(
            config.name.clone(),
            config.environment.clone(),
            pool,
            events_tx,
            errors_tx,
            root.clone(),
        ));
        let rng = Arc::new(SharedRng::new(config.seed));
        let venue = Arc::new(VenueBehaviour::new(
            config.name.clone(),
            config.venue,
            rng.clone(),
        ));

        let catalogue = Arc::new(InstrumentCatalogue::new());
        let initial = match source.fetch() {
            Ok(list) if !list.is_empty() => list,
            Ok(_) => default_instruments(),
            Err(err) => {
                warn!(%err, "initial instrument fetch failed, using defaults");
                default_instruments()
            }
        };
        catalogue.set_supported(initial);

        let market = Arc::new(MarketState::new(
            config.base_prices.clone(),
            SimulatorConfig::FALLBACK_BASE_PRICE,
            config.book_levels,
        ));
        let ledger = Arc::new(BalanceLedger::new());
        let engine = Arc::new(OrderEngine::new(
            config, catalogue, market, ledger, venue, rng, emitter,
        ));

        Arc::new(Self {
            engine,
            source,
            routes: tokio::sync::Mutex::new(HashMap::new()),
            order_tx,
            order_rx: Mutex::new(Some(order_rx)),
            events_rx: Mutex::new(Some(events_rx)),
            errors_rx: Mutex::new(Some(errors_rx)),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            root,
            tracker: TaskTracker::new(),
        })
    }

    fn slot<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The instance's display name.
    pub fn name(&self) -> &str {
        &self.engine.config.name
    }

    /// Launch the order consumer and the catalogue refresher.
    ///
    /// Idempotent by CAS: the first call wins, a second call errors. Must
    /// run inside a Tokio runtime.
    ///
    /// # Errors
    /// [`VenueError::AlreadyStarted`] on a repeat call,
    /// [`VenueError::ShuttingDown`] once the root context is cancelled.
    pub fn start(&self) -> Result<(), VenueError> {
        if self.root.is_cancelled() || self.stopped.load(Ordering::Acquire) {
            return Err(VenueError::ShuttingDown);
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(VenueError::AlreadyStarted);
        }
        let Some(order_rx) = Self::slot(&self.order_rx).take() else {
            return Err(VenueError::AlreadyStarted);
        };

        let engine = self.engine.clone();
        let root = self.root.clone();
        self.tracker
            .spawn(async move { run_order_consumer(engine, order_rx, root).await });

        let engine = self.engine.clone();
        let source = self.source.clone();
        let root = self.root.clone();
        self.tracker
            .spawn(async move { run_refresher(engine, source, root).await });

        info!(provider = %self.name(), "venue simulator started");
        Ok(())
    }

    /// Validate and install a new instrument set, emitting one
    /// InstrumentUpdate per changed or added symbol.
    ///
    /// Route filters do not apply to InstrumentUpdate events.
    pub async fn set_supported(&self, list: Vec<Instrument>) {
        apply_instruments(&self.engine, list).await;
    }

    /// Subscribe a route, launching its producer. Idempotent per route
    /// type.
    ///
    /// # Errors
    /// [`VenueError::UnsupportedRouteType`] for unknown or empty canonical
    /// types, [`VenueError::NotStarted`] before [`VenueSimulator::start`],
    /// [`VenueError::ShuttingDown`] after shutdown began.
    pub async fn subscribe_route(&self, route: Route) -> Result<(), VenueError> {
        let event_type = canonical_route_type(&route.route_type)?;
        if !self.started.load(Ordering::Acquire) {
            return Err(VenueError::NotStarted);
        }
        if self.root.is_cancelled() {
            return Err(VenueError::ShuttingDown);
        }

        let mut routes = self.routes.lock().await;
        if routes.contains_key(&event_type) {
            return Ok(());
        }
        let token = self.root.child_token();
        let handle = self.tracker.spawn(routes::run_route(
            self.engine.clone(),
            event_type,
            route.filters,
            token.clone(),
        ));
        routes.insert(event_type, RouteHandle { token, handle });
        info!(provider = %self.name(), event_type = %event_type, "route subscribed");
        Ok(())
    }

    /// Cancel a route's producer and wait until it has actually stopped
    /// emitting. Unknown route types are a no-op.
    pub async fn unsubscribe_route(&self, event_type: EventType) {
        let removed = { self.routes.lock().await.remove(&event_type) };
        if let Some(route) = removed {
            route.token.cancel();
            let _ = route.handle.await;
            info!(provider = %self.name(), event_type = %event_type, "route unsubscribed");
        }
    }

    /// Enqueue an order for the consumer task.
    ///
    /// Acceptance only means the queue took it; validation outcomes arrive
    /// asynchronously as execution reports.
    ///
    /// # Errors
    /// [`VenueError::NotStarted`] / [`VenueError::ShuttingDown`] from the
    /// lifecycle, [`VenueError::Cancelled`] when the caller's context is
    /// cancelled before the queue accepts.
    pub async fn submit_order(
        &self,
        cancel: &CancellationToken,
        mut request: OrderRequest,
    ) -> Result<(), VenueError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(VenueError::NotStarted);
        }
        if self.root.is_cancelled() {
            return Err(VenueError::ShuttingDown);
        }
        if request.provider.trim().is_empty() {
            request.provider = self.name().to_string();
        }
        let envelope = OrderEnvelope {
            request,
            cancel: cancel.clone(),
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(VenueError::Cancelled),
            _ = self.root.cancelled() => Err(VenueError::ShuttingDown),
            sent = self.order_tx.send(envelope) => sent.map_err(|_| VenueError::ShuttingDown),
        }
    }

    /// Take the events receiver. Available exactly once.
    ///
    /// # Errors
    /// [`VenueError::ReceiverTaken`] on a repeat call.
    pub fn events(&self) -> Result<mpsc::Receiver<Box<Event>>, VenueError> {
        Self::slot(&self.events_rx)
            .take()
            .ok_or(VenueError::ReceiverTaken)
    }

    /// Take the errors receiver. Available exactly once.
    ///
    /// # Errors
    /// [`VenueError::ReceiverTaken`] on a repeat call.
    pub fn errors(&self) -> Result<mpsc::Receiver<VenueError>, VenueError> {
        Self::slot(&self.errors_rx)
            .take()
            .ok_or(VenueError::ReceiverTaken)
    }

    /// The catalogued instruments, in catalogue order.
    pub fn instruments(&self) -> Vec<Instrument> {
        self.engine.catalogue.instruments()
    }

    /// Cancel the root context, wait for every task to exit, then close the
    /// events and errors channels. Safe to call more than once; only the
    /// first call does the work.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.root.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.engine.emitter.close_channels();
        self.engine.market.clear();
        info!(provider = %self.name(), "venue simulator stopped");
    }

    /// The engine, exposed for scenario tests.
    #[doc(hidden)]
    pub fn engine(&self) -> &Arc<OrderEngine> {
        &self.engine
    }
}

/// Validate, swap and diff-emit a new instrument set.
async fn apply_instruments(engine: &OrderEngine, list: Vec<Instrument>) {
    let changed = engine.catalogue.set_supported(list);
    let ts = now_utc();
    for instrument in changed {
        let symbol = instrument.symbol.clone();
        engine
            .emitter
            .emit_with(EventType::InstrumentUpdate, &symbol, ts, |_| {
                EventPayload::Instrument(Box::new(instrument))
            })
            .await;
    }
}

/// Periodically pull the instrument source and re-apply the catalogue.
/// Fetch errors surface on the error channel; empty results are ignored.
async fn run_refresher(
    engine: Arc<OrderEngine>,
    source: Arc<dyn InstrumentSource>,
    root: CancellationToken,
) {
    let period = engine.config.instrument_refresh_interval;
    let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = root.cancelled() => break,
            _ = timer.tick() => {}
        }
        match source.fetch() {
            Ok(list) if list.is_empty() => {}
            Ok(list) => apply_instruments(&engine, list).await,
            Err(err) => {
                warn!(%err, "instrument refresh failed");
                engine.emitter.emit_error(err);
            }
        }
    }
}

async fn run_order_consumer(
    engine: Arc<OrderEngine>,
    mut order_rx: mpsc::Receiver<OrderEnvelope>,
    root: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            _ = root.cancelled() => break,
            received = order_rx.recv() => match received {
                Some(envelope) => envelope,
                None => break,
            },
        };
        engine
            .handle_order(envelope.request, &envelope.cancel)
            .await;
    }
}
