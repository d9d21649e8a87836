//! Scheduler: one sequential valuation pass over every stored portfolio.
//!
//! Each portfolio is handled on its own:
//! - load and validate the file (bad names and schemas are skipped)
//! - fetch prices and revalue (an unreachable source skips just that one)
//! - apply the tactic, save, and append history
//!
//! A fixed delay separates portfolios to spare the price source.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::api::PriceFeed;
use crate::models::{HistorySnapshot, Portfolio};
use crate::rebalancing::{valuate, Decision, TacticConfig, TacticEngine};
use crate::store::{HistoryRecorder, PortfolioStore, StoreError};

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Directory holding `{STRATEGY}_{TACTIC}.csv` files
    pub portfolio_dir: PathBuf,

    /// Directory for the history logs
    pub results_dir: PathBuf,

    /// Pause between two portfolios
    pub delay_between: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            portfolio_dir: PathBuf::from("results/portfolios"),
            results_dir: PathBuf::from("results"),
            delay_between: Duration::from_secs(3),
        }
    }
}

/// Tally of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Portfolios revalued and written (rebalanced ones included)
    pub updated: usize,
    pub rebalanced: usize,
    /// Files that are not valid portfolios
    pub skipped: usize,
    /// Valid portfolios that could not be processed this pass
    pub failed: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated ({} rebalanced), {} skipped, {} failed",
            self.updated, self.rebalanced, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Update,
    Snapshot,
}

impl Pass {
    fn as_str(&self) -> &'static str {
        match self {
            Pass::Update => "update",
            Pass::Snapshot => "snapshot",
        }
    }
}

/// Why a portfolio was left out of a pass.
enum Setback {
    Skipped(String),
    Failed(anyhow::Error),
}

impl From<StoreError> for Setback {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Schema { .. } | StoreError::FilenamePattern(_) | StoreError::UnknownTactic { .. } => {
                Setback::Skipped(e.to_string())
            }
            other => Setback::Failed(other.into()),
        }
    }
}

/// Sequential runner over the portfolio directory.
pub struct Scheduler {
    config: SchedulerConfig,
    store: PortfolioStore,
    history: HistoryRecorder,
    feed: PriceFeed,
    engine: TacticEngine,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, feed: PriceFeed, tactics: TacticConfig) -> Self {
        Self {
            store: PortfolioStore::new(&config.portfolio_dir),
            history: HistoryRecorder::new(&config.results_dir),
            config,
            feed,
            engine: TacticEngine::new(tactics),
        }
    }

    pub fn store(&self) -> &PortfolioStore {
        &self.store
    }

    /// Revalue every portfolio, apply its tactic, persist and record history.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_pass(Pass::Update).await
    }

    /// Revalue every portfolio and append history rows only. Portfolio files
    /// are not touched.
    pub async fn record_snapshots(&self) -> Result<CycleReport> {
        self.run_pass(Pass::Snapshot).await
    }

    async fn run_pass(&self, pass: Pass) -> Result<CycleReport> {
        let files = self
            .store
            .list()
            .with_context(|| format!("Failed to list {}", self.store.dir().display()))?;

        if files.is_empty() {
            info!(dir = %self.store.dir().display(), "No portfolios found");
            return Ok(CycleReport::default());
        }

        info!(pass = pass.as_str(), count = files.len(), "Starting pass");

        let mut report = CycleReport::default();
        for (i, path) in files.iter().enumerate() {
            if i > 0 && !self.config.delay_between.is_zero() {
                tokio::time::sleep(self.config.delay_between).await;
            }

            let outcome = match pass {
                Pass::Update => self.update_one(path).await,
                Pass::Snapshot => self.snapshot_one(path).await,
            };

            let name = display_name(path);
            match outcome {
                Ok(decision) => {
                    report.updated += 1;
                    if decision.is_rebalance() {
                        report.rebalanced += 1;
                    }
                }
                Err(Setback::Skipped(reason)) => {
                    warn!(file = %name, reason = %reason, "Skipping file");
                    report.skipped += 1;
                }
                Err(Setback::Failed(e)) => {
                    error!(file = %name, error = %e, "Portfolio failed, continuing with the next one");
                    report.failed += 1;
                }
            }
        }

        info!(pass = pass.as_str(), report = %report, "Pass finished");
        Ok(report)
    }

    fn load(&self, path: &Path) -> Result<Portfolio, Setback> {
        let portfolio = self.store.load(path)?;
        if portfolio.is_empty() {
            return Err(Setback::Skipped("no holdings".to_string()));
        }
        Ok(portfolio)
    }

    async fn update_one(&self, path: &Path) -> Result<Decision, Setback> {
        let mut portfolio = self.load(path)?;
        let previous_value = portfolio.total_value();

        let valuation = valuate(&portfolio, &self.feed)
            .await
            .map_err(|e| Setback::Failed(anyhow::Error::new(e).context("price fetch failed")))?;

        let now = Utc::now();
        let decision = self.engine.apply(&mut portfolio, &valuation, now);

        self.store.save(&portfolio)?;

        info!(
            portfolio = %portfolio.id,
            value = %portfolio.net_value(),
            change_pct = %valuation.total_change_pct(previous_value),
            rebalanced = decision.is_rebalance(),
            "Portfolio updated"
        );

        if let Err(e) = self.history.record(&HistorySnapshot::from_portfolio(&portfolio, now)) {
            warn!(portfolio = %portfolio.id, error = %e, "Failed to record history");
        }

        Ok(decision)
    }

    async fn snapshot_one(&self, path: &Path) -> Result<Decision, Setback> {
        let portfolio = self.load(path)?;

        let valuation = valuate(&portfolio, &self.feed)
            .await
            .map_err(|e| Setback::Failed(anyhow::Error::new(e).context("price fetch failed")))?;

        let snapshot = HistorySnapshot::new(
            &portfolio.id,
            valuation.total_new_value + portfolio.dust,
            portfolio.start_value,
            Utc::now(),
        );
        self.history.record(&snapshot)?;

        debug!(portfolio = %portfolio.id, value = %snapshot.value, "Snapshot recorded");
        Ok(Decision::Hold)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
