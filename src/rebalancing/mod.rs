//! Valuation cycle: revalue a stored portfolio, then let its tactic decide
//! whether it is held or reset to equal weight.

mod config;
mod rebalancer;
mod tactics;
mod valuation;

pub use config::TacticConfig;
pub use rebalancer::rebalance;
pub use tactics::{Decision, TacticEngine};
pub use valuation::{valuate, Valuation};
