//! Tactic state machine: decides, per cycle, whether a revalued portfolio
//! is held or reset to equal weight.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::{Portfolio, Tactic};

use super::{rebalance, TacticConfig, Valuation};

/// Outcome of one cycle for one portfolio.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Refresh prices and values only
    Hold,
    /// Full equal-weight reset
    Rebalance(RebalanceReason),
}

impl Decision {
    pub fn is_rebalance(&self) -> bool {
        matches!(self, Decision::Rebalance(_))
    }
}

/// Why a rebalance fired.
#[derive(Debug, Clone, PartialEq)]
pub enum RebalanceReason {
    /// REGULAR: time since the last write reached the interval
    IntervalElapsed { elapsed: chrono::Duration },
    /// TRIGGER: a holding fell to or past the drop threshold
    Drawdown { ticker: String, change_pct: Decimal },
}

impl fmt::Display for RebalanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceReason::IntervalElapsed { elapsed } => {
                write!(f, "{}h since last update", elapsed.num_hours())
            }
            RebalanceReason::Drawdown { ticker, change_pct } => {
                write!(f, "{} changed {}%", ticker, change_pct.round_dp(2))
            }
        }
    }
}

/// Applies a portfolio's tactic to a fresh valuation.
pub struct TacticEngine {
    config: TacticConfig,
}

impl TacticEngine {
    pub fn new(config: TacticConfig) -> Self {
        Self { config }
    }

    /// Decide what the portfolio's tactic does with `valuation`.
    pub fn decide(&self, portfolio: &Portfolio, valuation: &Valuation, now: DateTime<Utc>) -> Decision {
        match portfolio.id.tactic {
            Tactic::Static => Decision::Hold,

            Tactic::Regular => {
                let elapsed = now - portfolio.last_updated_at;
                if elapsed >= self.config.rebalance_interval() {
                    Decision::Rebalance(RebalanceReason::IntervalElapsed { elapsed })
                } else {
                    debug!(
                        portfolio = %portfolio.id,
                        elapsed_hours = elapsed.num_hours(),
                        "Interval not reached"
                    );
                    Decision::Hold
                }
            }

            Tactic::Trigger => {
                let floor = self.config.trigger_floor_pct();
                match valuation.lines.iter().find(|l| l.change_pct <= floor) {
                    Some(line) => Decision::Rebalance(RebalanceReason::Drawdown {
                        ticker: line.ticker.clone(),
                        change_pct: line.change_pct,
                    }),
                    None => Decision::Hold,
                }
            }
        }
    }

    /// Run one cycle in memory: write the valuation into the portfolio and
    /// rebalance it when the tactic says so.
    pub fn apply(&self, portfolio: &mut Portfolio, valuation: &Valuation, now: DateTime<Utc>) -> Decision {
        let decision = self.decide(portfolio, valuation, now);

        valuation.apply(portfolio);
        if let Decision::Rebalance(reason) = &decision {
            info!(portfolio = %portfolio.id, tactic = %portfolio.id.tactic, reason = %reason, "Rebalance triggered");
            rebalance(portfolio, valuation);
        }

        portfolio.last_updated_at = now;
        decision
    }
}
