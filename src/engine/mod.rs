//! The order engine: submission lifecycle, autonomous trade generation, and
//! the balance ledger it settles into.

pub mod ledger;
pub mod submit;
pub mod trades;

pub use ledger::{BalanceLedger, BalanceState};
pub use submit::{OrderEngine, OrderRequest};
