//! Ranked candidate security produced by a prediction provider.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A ticker with a predicted growth score and its last known close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Exchange ticker symbol
    pub ticker: String,

    /// Signed growth fraction (0.10 = +10%)
    pub predicted_growth: Decimal,

    /// Last known close price, used when no live price can be resolved
    pub last_close: Decimal,
}

impl Candidate {
    pub fn new(ticker: impl Into<String>, predicted_growth: Decimal, last_close: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            predicted_growth,
            last_close,
        }
    }

    /// Whether the provider expects this ticker to grow.
    pub fn is_positive(&self) -> bool {
        self.predicted_growth > Decimal::ZERO
    }
}
