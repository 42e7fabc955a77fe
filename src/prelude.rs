//! Prelude module that re-exports the types most callers need.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use venuesim::prelude::*;
//! ```

// Instance and construction
pub use crate::provider::{
    register_factory, ProviderFactory, ProviderRegistry, Route, RouteFilter, VenueSimulator,
    FACTORY_KEY,
};

// Configuration and errors
pub use crate::config::SimulatorConfig;
pub use crate::error::VenueError;

// Events and the pool seam
pub use crate::events::{
    canonical_route_type, Event, EventPayload, EventPool, EventType,
};

// Instruments and the catalogue
pub use crate::instrument::{
    default_instruments, Instrument, InstrumentCatalogue, InstrumentConstraints,
    InstrumentSource, InstrumentType, StaticInstrumentSource,
};

// Market and order primitives
pub use crate::engine::{BalanceState, OrderRequest};
pub use crate::market::{OrderKind, OrderState, Side, TimeInForce};

// Venue behaviour knobs
pub use crate::venue::VenueBehaviourParams;

// Utility functions
pub use crate::utils::current_time_millis;
