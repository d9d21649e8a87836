//! Portfolio generation: one allocation per strategy, persisted once for
//! every tactic.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::allocation::{
    select_top_n, Allocation, AllocationConfig, AllocationError, Allocator, CandidateSource,
    RandomAllocator,
};
use crate::api::PriceFeed;
use crate::models::{PortfolioId, Tactic};
use crate::store::PortfolioStore;

/// Strategy name of the random baseline.
pub const RANDOM_STRATEGY: &str = "RANDOM";

/// What one generation run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Portfolios written this run
    pub created: Vec<PortfolioId>,
    /// Portfolios that already existed and were left alone
    pub kept: Vec<PortfolioId>,
    /// Strategies with nothing to allocate this run
    pub skipped_strategies: Vec<String>,
}

/// Builds new portfolios from the prediction sources and the universe.
pub struct PortfolioGenerator {
    store: PortfolioStore,
    config: AllocationConfig,
    allocator: Allocator,
    random: RandomAllocator,
    force: bool,
}

impl PortfolioGenerator {
    pub fn new(store: PortfolioStore, feed: PriceFeed, config: AllocationConfig) -> Self {
        Self {
            store,
            allocator: Allocator::new(feed.clone()),
            random: RandomAllocator::new(feed, &config),
            config,
            force: false,
        }
    }

    /// Overwrite existing portfolio files instead of keeping them.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Generate every ranked strategy, then the random baseline.
    ///
    /// A ranked strategy that cannot be allocated (no positive candidates,
    /// unreadable provider output) is skipped. An empty universe ends the run.
    pub async fn run(
        &self,
        sources: &[&dyn CandidateSource],
        universe: &[String],
        seed: u64,
    ) -> Result<GenerationReport> {
        let mut report = GenerationReport::default();

        for source in sources {
            let strategy = source.strategy().to_string();
            if let Err(e) = self.generate_ranked(*source, &mut report).await {
                warn!(strategy = %strategy, error = %e, "Skipping strategy");
                report.skipped_strategies.push(strategy);
            }
        }

        self.generate_random(universe, seed, &mut report).await?;

        info!(
            created = report.created.len(),
            kept = report.kept.len(),
            skipped = report.skipped_strategies.len(),
            "Generation finished"
        );
        Ok(report)
    }

    /// Allocate the top candidates of one source.
    pub async fn generate_ranked(&self, source: &dyn CandidateSource, report: &mut GenerationReport) -> Result<()> {
        let strategy = source.strategy();
        let pending = self.pending(strategy, report);
        if pending.is_empty() {
            return Ok(());
        }

        let candidates = source
            .candidates()
            .with_context(|| format!("Failed to load {} candidates", strategy))?;
        let top = select_top_n(candidates, self.config.top_n);
        info!(strategy = %strategy, candidates = top.len(), "Allocating");

        let allocation = self
            .allocator
            .allocate(&top, self.config.total_investment, self.config.allow_fractional)
            .await?;

        self.persist(pending, allocation, report)
    }

    /// Allocate the random baseline from the universe.
    pub async fn generate_random(&self, universe: &[String], seed: u64, report: &mut GenerationReport) -> Result<()> {
        let pending = self.pending(RANDOM_STRATEGY, report);
        if pending.is_empty() {
            return Ok(());
        }

        let result = self
            .random
            .allocate(universe, self.config.total_investment, self.config.allow_fractional, Some(seed))
            .await;

        let allocation = match result {
            Ok(allocation) => allocation,
            Err(AllocationError::EmptyUniverse) => bail!("candidate universe is empty"),
            Err(e) => {
                warn!(strategy = RANDOM_STRATEGY, error = %e, "Skipping strategy");
                report.skipped_strategies.push(RANDOM_STRATEGY.to_string());
                return Ok(());
            }
        };

        self.persist(pending, allocation, report)
    }

    /// Tactics of `strategy` that still need a file. Existing ones are
    /// recorded as kept unless generation is forced.
    fn pending(&self, strategy: &str, report: &mut GenerationReport) -> Vec<PortfolioId> {
        let mut pending = Vec::new();
        for tactic in Tactic::ALL {
            let id = PortfolioId::new(strategy, tactic);
            if !self.force && self.store.exists(&id) {
                info!(portfolio = %id, "Portfolio exists, keeping it");
                report.kept.push(id);
            } else {
                pending.push(id);
            }
        }
        pending
    }

    fn persist(&self, ids: Vec<PortfolioId>, allocation: Allocation, report: &mut GenerationReport) -> Result<()> {
        let now = Utc::now();
        for id in ids {
            let portfolio = allocation.clone().into_portfolio(id.clone(), now);
            let path = self
                .store
                .save(&portfolio)
                .with_context(|| format!("Failed to save {}", id))?;
            info!(
                portfolio = %id,
                path = %path.display(),
                value = %portfolio.net_value(),
                dust = %portfolio.dust,
                "Portfolio created"
            );
            report.created.push(id);
        }
        Ok(())
    }
}
