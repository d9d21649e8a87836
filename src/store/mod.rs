//! File persistence for portfolios and their history.
//!
//! Layout:
//! - `{portfolio_dir}/{STRATEGY}_{TACTIC}.csv`: holdings table, rewritten
//!   wholesale on every update
//! - `{portfolio_dir}/{STRATEGY}_{TACTIC}.meta.json`: capital, dust, start
//!   value and creation time
//! - `{results_dir}/portfolio_history.csv` and
//!   `{results_dir}/history_{STRATEGY}_{TACTIC}.csv`: append-only logs
//!
//! Files are replaced atomically (temp file + rename). There is no locking:
//! one writer per portfolio at a time.

mod history;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::models::{Portfolio, PortfolioEntry, PortfolioId, Tactic};

pub use history::HistoryRecorder;

/// Columns every persisted portfolio must carry.
const REQUIRED_COLUMNS: [&str; 6] = [
    "Ticker",
    "Weight",
    "Investment($)",
    "Price",
    "Shares",
    "CurrentValue($)",
];

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: missing required column `{column}`", path.display())]
    Schema { path: PathBuf, column: String },

    #[error("file name `{0}` does not match STRATEGY_TACTIC.csv")]
    FilenamePattern(String),

    #[error("file name `{file}` names an unknown tactic `{tactic}`")]
    UnknownTactic { file: String, tactic: String },

    #[error("{}: invalid metadata: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parse a number written either plainly or in scientific notation
/// (`1.2e-05`), as float-based tools tend to emit.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Resolve the positions of `columns` in a header row.
pub fn require_columns<const N: usize>(
    path: &Path,
    headers: &StringRecord,
    columns: [&str; N],
) -> Result<[usize; N], StoreError> {
    let mut positions = [0usize; N];
    for (slot, column) in positions.iter_mut().zip(columns) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| StoreError::Schema {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
    }
    Ok(positions)
}

/// Recover a portfolio identity from `{STRATEGY}_{TACTIC}.csv`, both parts
/// uppercase ASCII letters.
pub fn parse_file_name(file_name: &str) -> Result<PortfolioId, StoreError> {
    let pattern_err = || StoreError::FilenamePattern(file_name.to_string());

    let stem = file_name.strip_suffix(".csv").ok_or_else(pattern_err)?;
    let (strategy, tactic) = stem.split_once('_').ok_or_else(pattern_err)?;

    let is_upper_word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase());
    if !is_upper_word(strategy) || !is_upper_word(tactic) {
        return Err(pattern_err());
    }

    let tactic: Tactic = tactic.parse().map_err(|_| StoreError::UnknownTactic {
        file: file_name.to_string(),
        tactic: tactic.to_string(),
    })?;

    Ok(PortfolioId::new(strategy, tactic))
}

/// One holdings row as written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "Weight", with = "decimal_field")]
    weight: Decimal,
    #[serde(rename = "Investment($)", with = "decimal_field")]
    investment: Decimal,
    #[serde(rename = "Price", with = "decimal_field")]
    price: Decimal,
    #[serde(rename = "Shares", with = "decimal_field")]
    shares: Decimal,
    #[serde(rename = "CurrentValue($)", with = "decimal_field")]
    current_value: Decimal,
    #[serde(rename = "Change(%)", with = "decimal_field::option", default)]
    change_pct: Option<Decimal>,
}

impl From<&PortfolioEntry> for EntryRecord {
    fn from(e: &PortfolioEntry) -> Self {
        Self {
            ticker: e.ticker.clone(),
            weight: e.weight,
            investment: e.investment,
            price: e.price,
            shares: e.shares,
            current_value: e.current_value,
            change_pct: e.change_pct,
        }
    }
}

impl From<EntryRecord> for PortfolioEntry {
    fn from(r: EntryRecord) -> Self {
        Self {
            ticker: r.ticker.trim().to_string(),
            weight: r.weight,
            investment: r.investment,
            price: r.price,
            shares: r.shares,
            current_value: r.current_value,
            change_pct: r.change_pct,
        }
    }
}

/// Holdings columns: written as plain decimal strings, read back with
/// [`parse_decimal`].
mod decimal_field {
    use rust_decimal::Decimal;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_decimal(&raw).ok_or_else(|| de::Error::custom(format!("invalid number '{}'", raw)))
    }

    pub mod option {
        use rust_decimal::Decimal;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.collect_str(v),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.trim().is_empty() => super::super::parse_decimal(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid number '{}'", raw))),
                _ => Ok(None),
            }
        }
    }
}

/// Portfolio-level fields that do not fit the holdings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PortfolioMeta {
    total_investment: Decimal,
    dust: Decimal,
    #[serde(default)]
    start_value: Option<Decimal>,
    #[serde(default = "default_fractional")]
    fractional: bool,
    created_at: DateTime<Utc>,
}

fn default_fractional() -> bool {
    true
}

/// Directory of persisted portfolios.
pub struct PortfolioStore {
    dir: PathBuf,
}

impl PortfolioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &PortfolioId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    pub fn exists(&self, id: &PortfolioId) -> bool {
        self.path_for(id).is_file()
    }

    /// Every `*.csv` file in the directory, sorted by name. A missing
    /// directory holds no portfolios.
    pub fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn load_id(&self, id: &PortfolioId) -> Result<Portfolio, StoreError> {
        self.load(&self.path_for(id))
    }

    /// Load and validate a portfolio file and its sidecar metadata.
    pub fn load(&self, path: &Path) -> Result<Portfolio, StoreError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::FilenamePattern(path.display().to_string()))?;
        let id = parse_file_name(file_name)?;

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        require_columns(path, &headers, REQUIRED_COLUMNS)?;

        let mut entries = Vec::new();
        for record in reader.deserialize::<EntryRecord>() {
            entries.push(PortfolioEntry::from(record?));
        }

        let modified: DateTime<Utc> = fs::metadata(path)?.modified()?.into();

        let meta_path = self.dir.join(id.meta_file_name());
        let meta = if meta_path.is_file() {
            let raw = fs::read_to_string(&meta_path)?;
            serde_json::from_str::<PortfolioMeta>(&raw).map_err(|source| StoreError::Metadata {
                path: meta_path.clone(),
                source,
            })?
        } else {
            debug!(portfolio = %id, "No metadata sidecar, deriving defaults");
            PortfolioMeta {
                total_investment: entries.iter().map(|e| e.investment).sum(),
                dust: Decimal::ZERO,
                start_value: None,
                fractional: true,
                created_at: modified,
            }
        };

        Ok(Portfolio {
            id,
            entries,
            total_investment: meta.total_investment,
            dust: meta.dust,
            start_value: meta.start_value,
            fractional: meta.fractional,
            created_at: meta.created_at,
            last_updated_at: modified,
        })
    }

    /// Overwrite the portfolio's files. Returns the holdings file path.
    pub fn save(&self, portfolio: &Portfolio) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;

        let meta = PortfolioMeta {
            total_investment: portfolio.total_investment,
            dust: portfolio.dust,
            start_value: portfolio.start_value,
            fractional: portfolio.fractional,
            created_at: portfolio.created_at,
        };
        let meta_path = self.dir.join(portfolio.id.meta_file_name());
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|source| StoreError::Metadata {
            path: meta_path.clone(),
            source,
        })?;

        // Stage both files before renaming either into place.
        let holdings = self.stage(|file| {
            let mut writer = csv::Writer::from_writer(file);
            for entry in &portfolio.entries {
                writer.serialize(EntryRecord::from(entry))?;
            }
            writer.flush()?;
            Ok(())
        })?;
        let sidecar = self.stage(|file| file.write_all(&meta_json).map_err(StoreError::from))?;

        let path = self.path_for(&portfolio.id);
        holdings.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        sidecar.persist(&meta_path).map_err(|e| StoreError::Io(e.error))?;

        debug!(portfolio = %portfolio.id, path = %path.display(), "Portfolio saved");
        Ok(path)
    }

    /// Write a synced temp file in the store directory, ready to be renamed
    /// over its target.
    fn stage<F>(&self, write: F) -> Result<NamedTempFile, StoreError>
    where
        F: FnOnce(&mut NamedTempFile) -> Result<(), StoreError>,
    {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        write(&mut tmp)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}
