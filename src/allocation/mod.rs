//! Capital allocation: turns ranked candidates (or a random draw from the
//! universe) into a concrete holdings table.

mod allocator;
mod config;
mod predictions;
mod random_allocator;
mod sizing;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{Portfolio, PortfolioEntry, PortfolioId};

pub use allocator::Allocator;
pub use config::AllocationConfig;
pub use predictions::{select_top_n, CandidateSource, CsvCandidateSource};
pub use random_allocator::RandomAllocator;
pub use sizing::{size_holdings, Holding, SizedHoldings};

/// Structural allocation failures, raised to the caller of an allocation.
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("no candidates with positive predicted growth")]
    NoPositiveCandidates,

    #[error("total investment must be positive, got {0}")]
    InvalidInvestment(Decimal),

    #[error("candidate universe is empty")]
    EmptyUniverse,

    #[error("no price could be resolved for any selected ticker")]
    NoPricedHoldings,
}

/// Result of an allocation call, not yet bound to a tactic.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub entries: Vec<PortfolioEntry>,
    pub total_investment: Decimal,
    pub dust: Decimal,
    pub fractional: bool,
}

impl Allocation {
    /// Sum of holding values at allocation time.
    pub fn total_value(&self) -> Decimal {
        self.entries.iter().map(|e| e.current_value).sum()
    }

    pub fn total_weight(&self) -> Decimal {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Bind the allocation to a (strategy, tactic) identity.
    pub fn into_portfolio(self, id: PortfolioId, now: DateTime<Utc>) -> Portfolio {
        let start_value = self.total_value() + self.dust;
        Portfolio {
            id,
            entries: self.entries,
            total_investment: self.total_investment,
            dust: self.dust,
            start_value: Some(start_value),
            fractional: self.fractional,
            created_at: now,
            last_updated_at: now,
        }
    }
}
