//! # Synthetic Trading-Venue Simulator
//!
//! A simulated spot exchange for downstream routers, strategies and test
//! harnesses that need realistic, deterministic-by-seed market behaviour
//! without touching a real venue. One instance covers a catalogue of spot
//! instruments and produces the full canonical event stream — tickers,
//! trades, order-book snapshots and deltas, kline summaries, balance
//! updates, instrument-catalogue updates and execution reports — while
//! accepting simulated order flow against an internal matching engine.
//!
//! ## Key Features
//!
//! - **Seeded market model**: a geometric random walk with Gaussian shocks
//!   drives every instrument's price; a single seeded PRNG behind one mutex
//!   makes the whole emission sequence reproducible under a fixed seed.
//!
//! - **Tick-keyed order book**: each side is a `BTreeMap` of integer price
//!   ticks to depth levels. Levels keep house (synthetic) liquidity separate
//!   from user orders, so matching consumes user FIFO first, then synthetic,
//!   the way real venues prioritize resting flow.
//!
//! - **Full TIF semantics**: GTC rests, IOC cancels the remainder, FOK
//!   rejects unless fully fillable, post-only rejects when it would cross.
//!   Every lifecycle transition emits an execution report.
//!
//! - **Venue behaviour model**: injected latency, transient errors and
//!   stochastic disconnect windows gate every emission path uniformly, so
//!   consumers see the failure modes of a real exchange feed.
//!
//! - **Route-scoped producers**: each subscribed route runs its own
//!   cancellable task; unsubscribing does not return until the producer has
//!   actually stopped emitting.
//!
//! - **Bounded, pool-backed emission**: events are borrowed from an
//!   external pool, stamped with monotonic per-(type, symbol) sequence
//!   numbers, and delivered over a bounded channel whose backpressure
//!   throttles generation. Pool exhaustion and venue refusals drop the
//!   payload, never crash.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use venuesim::prelude::*;
//!
//! # struct MyPool;
//! # #[async_trait::async_trait]
//! # impl EventPool for MyPool {
//! #     async fn borrow_event(
//! #         &self,
//! #         _cancel: &CancellationToken,
//! #     ) -> Result<Box<Event>, VenueError> {
//! #         Ok(Box::new(Event::empty()))
//! #     }
//! #     fn return_event(&self, _event: Box<Event>) {}
//! # }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), VenueError> {
//! let mut registry = ProviderRegistry::new();
//! register_factory(&mut registry);
//!
//! let pool: Arc<dyn EventPool> = Arc::new(MyPool);
//! let instance = registry.create(
//!     FACTORY_KEY,
//!     CancellationToken::new(),
//!     Some(pool),
//!     &HashMap::new(),
//! )?;
//!
//! instance.start()?;
//! let mut events = instance.events()?;
//! instance
//!     .subscribe_route(Route {
//!         route_type: "TICKER".to_string(),
//!         filters: vec![],
//!     })
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{} seq={}", event.id, event.sequence);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Multi-threaded cooperative. Every producer, the single order consumer
//! and the catalogue refresher run on tracked Tokio tasks against a root
//! `CancellationToken`; timer waits, latency sleeps, channel sends and pool
//! borrows all race that token. Instrument state sits behind one mutex per
//! instrument, created lazily and only destroyed at shutdown; no event is
//! ever emitted while a lock is held. Lock order is route table first, then
//! at most one of {instrument, catalogue, ledger, venue, PRNG, sequence
//! table} — never the reverse, which makes deadlock impossible by
//! construction.
//!
//! ## Status
//!
//! The simulator is a test double. Balances accumulate in floats and format
//! with 8 decimals; move to fixed-point before trusting the arithmetic for
//! anything beyond simulation.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod instrument;
pub mod market;
pub mod provider;
pub mod venue;

pub mod prelude;
mod utils;

pub use config::SimulatorConfig;
pub use engine::{BalanceLedger, BalanceState, OrderEngine, OrderRequest};
pub use error::VenueError;
pub use events::{
    canonical_route_type, Event, EventEmitter, EventPayload, EventPool, EventType,
};
pub use instrument::{
    default_instruments, CatalogueEntry, Instrument, InstrumentCatalogue, InstrumentConstraints,
    InstrumentSource, InstrumentType, StaticInstrumentSource,
};
pub use market::{
    ActiveOrder, KlineWindow, OrderKind, OrderState, PriceModelParams, PriceTick, Side, TickBook,
    TimeInForce,
};
pub use provider::{
    register_factory, ProviderFactory, ProviderRegistry, Route, RouteFilter, VenueSimulator,
    FACTORY_KEY,
};
pub use utils::current_time_millis;
pub use venue::{GateOutcome, OperationalStatus, VenueBehaviour, VenueBehaviourParams};
