//! Candidate lists produced by the prediction providers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::Candidate;
use crate::store::{parse_decimal, require_columns, StoreError};

/// A ranked candidate list. An empty list means no actionable predictions
/// this cycle.
pub trait CandidateSource {
    /// Strategy name the candidates feed (e.g. "AI", "NEWS")
    fn strategy(&self) -> &str;

    fn candidates(&self) -> Result<Vec<Candidate>>;
}

/// Reads a provider's output file with `Ticker`, `PredictedGrowth` and
/// `LastClose` columns. Other columns are ignored; rows whose numbers do not
/// parse are skipped.
pub struct CsvCandidateSource {
    strategy: String,
    path: PathBuf,
}

impl CsvCandidateSource {
    pub fn new(strategy: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            strategy: strategy.into(),
            path: path.into(),
        }
    }
}

impl CandidateSource for CsvCandidateSource {
    fn strategy(&self) -> &str {
        &self.strategy
    }

    fn candidates(&self) -> Result<Vec<Candidate>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let headers = reader.headers().map_err(StoreError::from)?.clone();
        let [ticker_idx, growth_idx, close_idx] =
            require_columns(&self.path, &headers, ["Ticker", "PredictedGrowth", "LastClose"])?;

        let mut candidates = Vec::new();
        for record in reader.records() {
            let record = record.map_err(StoreError::from)?;

            let ticker = record.get(ticker_idx).unwrap_or_default().trim().to_uppercase();
            let growth = record.get(growth_idx).and_then(parse_decimal);
            let close = record.get(close_idx).and_then(parse_decimal);

            match (growth, close) {
                (Some(growth), Some(close)) if !ticker.is_empty() => {
                    candidates.push(Candidate::new(ticker, growth, close));
                }
                _ => debug!(row = ?record, "Skipping incomplete candidate row"),
            }
        }

        Ok(candidates)
    }
}

/// Parse plain or scientific notation.
/// Keep the `n` candidates with the highest predicted growth. Ties keep
/// their input order.
pub fn select_top_n(mut candidates: Vec<Candidate>, n: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.predicted_growth.cmp(&a.predicted_growth));
    candidates.truncate(n);
    candidates
}
