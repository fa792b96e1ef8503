//! Pluggable strategies and the metadata the splitter keeps about them.
//!
//! - `adapter`: the capability trait every strategy implements
//! - `slot`: per-strategy allocation state (capacity, pause flag, APR history)
//! - `mock`: an in-memory strategy for simulations and tests

mod adapter;
pub mod mock;
mod slot;

pub use adapter::{HardWorkReport, StrategyAdapter};
pub use mock::{MockStrategy, MockStrategyState};
pub use slot::{AprHistory, StrategySlot};

#[cfg(test)]
pub use adapter::MockStrategyAdapter;
