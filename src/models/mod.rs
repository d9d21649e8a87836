//! Data models for candidates, portfolios, tactics and history snapshots.

mod candidate;
mod history;
mod portfolio;
mod tactic;

pub use candidate::Candidate;
pub use history::HistorySnapshot;
pub use portfolio::{Portfolio, PortfolioEntry, PortfolioId};
pub use tactic::Tactic;
