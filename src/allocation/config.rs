//! Allocation configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for building new portfolios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Capital per portfolio
    pub total_investment: Decimal,

    /// Allow fractional shares; whole shares leave dust otherwise
    pub allow_fractional: bool,

    /// Number of top-ranked candidates kept per prediction strategy
    pub top_n: usize,

    /// Smallest random portfolio
    pub random_min_holdings: usize,

    /// Largest random portfolio
    pub random_max_holdings: usize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            total_investment: dec!(10000),
            allow_fractional: true,
            top_n: 10,
            random_min_holdings: 5,
            random_max_holdings: 20,
        }
    }
}
