//! Tactic configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds for the REGULAR and TRIGGER tactics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TacticConfig {
    /// REGULAR rebalances once this many days have passed since the
    /// portfolio file was last written
    pub rebalance_interval_days: i64,

    /// TRIGGER rebalances when any holding's change is at or below
    /// `-threshold * 100` percent (0.0 to 1.0)
    pub trigger_drop_threshold: Decimal,
}

impl Default for TacticConfig {
    fn default() -> Self {
        Self {
            rebalance_interval_days: 2,
            trigger_drop_threshold: dec!(0.05), // 5% drop
        }
    }
}

impl TacticConfig {
    pub fn rebalance_interval(&self) -> chrono::Duration {
        chrono::Duration::days(self.rebalance_interval_days)
    }

    /// Drop threshold expressed in percent, as a negative number.
    pub fn trigger_floor_pct(&self) -> Decimal {
        -(self.trigger_drop_threshold * Decimal::ONE_HUNDRED)
    }
}
