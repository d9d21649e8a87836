use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::models::{HistorySnapshot, PortfolioId};

use super::StoreError;

const GLOBAL_LOG: &str = "portfolio_history.csv";

/// Appends valuation snapshots to the global log and the per-portfolio
/// detail log. Rows are never rewritten.
pub struct HistoryRecorder {
    results_dir: PathBuf,
}

impl HistoryRecorder {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn global_path(&self) -> PathBuf {
        self.results_dir.join(GLOBAL_LOG)
    }

    pub fn detail_path(&self, id: &PortfolioId) -> PathBuf {
        self.results_dir.join(format!("history_{}.csv", id))
    }

    pub fn record(&self, snapshot: &HistorySnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.results_dir)?;

        append_row(&self.global_path(), snapshot)?;

        let id = PortfolioId::new(
            snapshot.strategy.clone(),
            snapshot
                .tactic
                .parse()
                .map_err(|_| StoreError::UnknownTactic {
                    file: snapshot.portfolio_id.clone(),
                    tactic: snapshot.tactic.clone(),
                })?,
        );
        append_row(&self.detail_path(&id), &snapshot.detail())?;

        debug!(portfolio = %snapshot.portfolio_id, value = %snapshot.value, "History recorded");
        Ok(())
    }
}

/// Append one row, writing the header only when the file is new or empty.
fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<(), StoreError> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tactic;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn fields(line: &str) -> Vec<&str> {
        line.split(',').collect()
    }

    fn numbers(line: &str, from: usize) -> Vec<rust_decimal::Decimal> {
        fields(line)[from..].iter().map(|f| f.parse().unwrap()).collect()
    }

    #[test]
    fn test_record_appends_to_both_logs() {
        let dir = tempdir().unwrap();
        let recorder = HistoryRecorder::new(dir.path().join("results"));
        let id = PortfolioId::new("AI", Tactic::Trigger);
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap();

        recorder
            .record(&HistorySnapshot::new(&id, dec!(1050), Some(dec!(1000)), at))
            .unwrap();
        recorder
            .record(&HistorySnapshot::new(&id, dec!(990), Some(dec!(1000)), at))
            .unwrap();

        let global = read_lines(&recorder.global_path());
        assert_eq!(global.len(), 3);
        assert_eq!(
            global[0],
            "Timestamp,Portfolio,Strategy,Tactic,Value($),StartValue($),Change($),Change(%)"
        );
        assert_eq!(fields(&global[1])[..4], ["2026-10-01 09:30:00", "AI_TRIGGER.csv", "AI", "TRIGGER"]);
        assert_eq!(numbers(&global[1], 4), vec![dec!(1050), dec!(1000), dec!(50), dec!(5)]);
        assert_eq!(numbers(&global[2], 4), vec![dec!(990), dec!(1000), dec!(-10), dec!(-1)]);

        let detail = read_lines(&recorder.detail_path(&id));
        assert!(recorder.detail_path(&id).ends_with("history_AI_TRIGGER.csv"));
        assert_eq!(detail.len(), 3);
        assert_eq!(detail[0], "Timestamp,Value($),Change(%)");
        assert_eq!(fields(&detail[2])[0], "2026-10-01 09:30:00");
        assert_eq!(numbers(&detail[2], 1), vec![dec!(990), dec!(-1)]);
    }

    #[test]
    fn test_missing_start_value_is_blank() {
        let dir = tempdir().unwrap();
        let recorder = HistoryRecorder::new(dir.path());
        let id = PortfolioId::new("NEWS", Tactic::Static);

        recorder
            .record(&HistorySnapshot::new(&id, dec!(800), None, Utc::now()))
            .unwrap();

        let global = read_lines(&recorder.global_path());
        let row = fields(&global[1]);
        assert_eq!(row[1..], ["NEWS_STATIC.csv", "NEWS", "STATIC", "800", "", "0", "0"]);
    }
}
