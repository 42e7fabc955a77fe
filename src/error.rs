//! Simulator error types.

use thiserror::Error;

/// Errors surfaced by the venue simulator.
///
/// Validation failures on submitted orders are *not* represented here: they
/// surface asynchronously as REJECTED execution reports while the submission
/// call itself succeeds. This enum covers the synchronous taxonomy
/// (configuration, lifecycle) plus the resource and simulated-venue failures
/// delivered on the error channel.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum VenueError {
    /// Symbol not present in the instrument catalogue.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// Route type is not one of the supported canonical types.
    #[error("unsupported canonical type: {0:?}")]
    UnsupportedRouteType(String),

    /// Instrument failed catalogue validation.
    #[error("invalid instrument {symbol}: {message}")]
    InvalidInstrument {
        /// Native symbol of the offending instrument
        symbol: String,
        /// Why validation rejected it
        message: String,
    },

    /// A configuration value could not be interpreted.
    #[error("invalid configuration value for {key:?}: {message}")]
    InvalidConfig {
        /// The offending config key
        key: String,
        /// Why parsing rejected it
        message: String,
    },

    /// The factory was invoked without an event pool manager.
    #[error("event pool manager is required")]
    MissingPool,

    /// No factory registered under the requested provider key.
    #[error("unknown provider factory: {0}")]
    UnknownFactory(String),

    /// Operation requires `start` to have been called first.
    #[error("provider not started")]
    NotStarted,

    /// `start` was called on an already-running instance.
    #[error("provider already started")]
    AlreadyStarted,

    /// The instance is shutting down; no further work is accepted.
    #[error("provider shutting down")]
    ShuttingDown,

    /// The caller's context was cancelled before the operation completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The event pool could not lend an event object.
    #[error("event pool exhausted")]
    PoolExhausted,

    /// The events or errors receiver was already handed out.
    #[error("channel receiver already taken")]
    ReceiverTaken,

    /// A simulated venue disruption (transient error or disconnect window).
    #[error("venue error: {0}")]
    Venue(String),
}

impl VenueError {
    /// Short label used for metric reasons.
    pub fn reason(&self) -> &'static str {
        match self {
            VenueError::UnknownInstrument(_) => "unknown_instrument",
            VenueError::UnsupportedRouteType(_) => "unsupported_route",
            VenueError::InvalidInstrument { .. } => "invalid_instrument",
            VenueError::InvalidConfig { .. } => "invalid_config",
            VenueError::MissingPool => "missing_pool",
            VenueError::UnknownFactory(_) => "unknown_factory",
            VenueError::NotStarted => "not_started",
            VenueError::AlreadyStarted => "already_started",
            VenueError::ShuttingDown => "shutting_down",
            VenueError::Cancelled => "cancelled",
            VenueError::PoolExhausted => "pool_exhausted",
            VenueError::ReceiverTaken => "receiver_taken",
            VenueError::Venue(_) => "venue",
        }
    }
}
