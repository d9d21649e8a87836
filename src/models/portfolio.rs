//! Portfolio model: a holdings table owned by one (strategy, tactic) pair.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Tactic;

/// Identity of a persisted portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortfolioId {
    /// Strategy name, uppercase letters only (e.g. "AI", "RANDOM")
    pub strategy: String,

    /// Rebalancing tactic
    pub tactic: Tactic,
}

impl PortfolioId {
    pub fn new(strategy: impl Into<String>, tactic: Tactic) -> Self {
        Self {
            strategy: strategy.into(),
            tactic,
        }
    }

    /// Holdings file name, `{STRATEGY}_{TACTIC}.csv`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.csv", self.strategy, self.tactic)
    }

    /// Sidecar metadata file name.
    pub fn meta_file_name(&self) -> String {
        format!("{}_{}.meta.json", self.strategy, self.tactic)
    }
}

impl fmt::Display for PortfolioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.strategy, self.tactic)
    }
}

/// One holding in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub ticker: String,

    /// Fraction of capital allocated to this holding (0-1)
    pub weight: Decimal,

    /// Capital allocated to this holding
    pub investment: Decimal,

    /// Latest known price per share
    pub price: Decimal,

    /// Shares held (whole numbers when fractional shares are disallowed)
    pub shares: Decimal,

    /// shares * price
    pub current_value: Decimal,

    /// Price change in percent against the previous cycle's price.
    /// Empty until the first valuation cycle.
    #[serde(default)]
    pub change_pct: Option<Decimal>,
}

/// A simulated investment portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub id: PortfolioId,

    /// Holdings, in allocation order
    pub entries: Vec<PortfolioEntry>,

    /// Capital the portfolio was created with
    pub total_investment: Decimal,

    /// Uninvested capital left over by whole-share sizing
    pub dust: Decimal,

    /// Portfolio value at creation, the baseline for history change figures
    pub start_value: Option<Decimal>,

    /// Whether fractional shares are allowed when (re)sizing holdings
    pub fractional: bool,

    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Portfolio {
    /// Sum of current holding values.
    pub fn total_value(&self) -> Decimal {
        self.entries.iter().map(|e| e.current_value).sum()
    }

    /// Holdings plus uninvested cash. History and rebalances use this basis.
    pub fn net_value(&self) -> Decimal {
        self.total_value() + self.dust
    }

    /// Sum of holding weights.
    pub fn total_weight(&self) -> Decimal {
        self.entries.iter().map(|e| e.weight).sum()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.ticker.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
