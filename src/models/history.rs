//! Append-only history records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Portfolio, PortfolioId};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One immutable row of the global history log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    #[serde(rename = "Timestamp", serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Portfolio file name
    #[serde(rename = "Portfolio")]
    pub portfolio_id: String,

    #[serde(rename = "Strategy")]
    pub strategy: String,

    #[serde(rename = "Tactic")]
    pub tactic: String,

    #[serde(rename = "Value($)")]
    pub value: Decimal,

    #[serde(rename = "StartValue($)")]
    pub start_value: Option<Decimal>,

    #[serde(rename = "Change($)")]
    pub change_abs: Decimal,

    #[serde(rename = "Change(%)")]
    pub change_pct: Decimal,
}

impl HistorySnapshot {
    /// Build a snapshot of `value` against the portfolio's start value.
    /// Without a known start value the change figures are zero.
    pub fn new(id: &PortfolioId, value: Decimal, start_value: Option<Decimal>, at: DateTime<Utc>) -> Self {
        let (change_abs, change_pct) = match start_value {
            Some(start) if !start.is_zero() => {
                let abs = value - start;
                (abs.round_dp(2), (abs / start * Decimal::ONE_HUNDRED).round_dp(2))
            }
            _ => (Decimal::ZERO, Decimal::ZERO),
        };

        Self {
            timestamp: at,
            portfolio_id: id.file_name(),
            strategy: id.strategy.clone(),
            tactic: id.tactic.to_string(),
            value: value.round_dp(2),
            start_value: start_value.map(|v| v.round_dp(2)),
            change_abs,
            change_pct,
        }
    }

    /// Snapshot of holdings plus cash, so flooring shares into dust is not
    /// recorded as a loss.
    pub fn from_portfolio(portfolio: &Portfolio, at: DateTime<Utc>) -> Self {
        Self::new(&portfolio.id, portfolio.net_value(), portfolio.start_value, at)
    }

    /// Narrow row for the per-(strategy, tactic) detail log.
    pub fn detail(&self) -> DetailRow {
        DetailRow {
            timestamp: self.timestamp,
            value: self.value,
            change_pct: self.change_pct,
        }
    }
}

/// One row of a per-(strategy, tactic) detail log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    #[serde(rename = "Timestamp", serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "Value($)")]
    pub value: Decimal,

    #[serde(rename = "Change(%)")]
    pub change_pct: Decimal,
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
}
