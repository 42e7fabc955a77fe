//! Per-instrument market state: the stochastic price model, the tick-keyed
//! order book, kline aggregation, and the lazily-created state table.

pub mod book;
pub mod depth;
pub mod kline;
pub mod model;
pub mod state;

pub use book::TickBook;
pub use depth::{
    ActiveOrder, BookDepth, ConsumeOutcome, Fill, LevelChange, OrderKind, OrderState, PriceTick,
    Side, TimeInForce, QTY_EPSILON,
};
pub use kline::{KlineTrack, KlineWindow};
pub use model::{PriceModelParams, SharedRng};
pub use state::{InstrumentState, MarketState};
