//! Application configuration: defaults, then environment (`.env` supported),
//! then CLI overrides applied in `main`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::allocation::AllocationConfig;
use crate::api::RetryPolicy;
use crate::rebalancing::TacticConfig;
use crate::scheduler::SchedulerConfig;

/// Where the prediction providers and the universe cache live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPaths {
    /// Growth model output (`Ticker, PredictedGrowth, LastClose`)
    pub ai_predictions: PathBuf,

    /// Sentiment model output, same columns
    pub news_predictions: PathBuf,

    /// Cached `Ticker, Company` universe list
    pub universe_cache: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            ai_predictions: PathBuf::from("results/ai_predictions.csv"),
            news_predictions: PathBuf::from("results/news_predictions.csv"),
            universe_cache: PathBuf::from("nasdaq100_companies.csv"),
        }
    }
}

/// Everything the binary needs, built once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub allocation: AllocationConfig,
    pub tactics: TacticConfig,
    pub retry: RetryPolicy,
    pub scheduler: SchedulerConfig,
    pub inputs: InputPaths,
}

impl AppConfig {
    /// Defaults overridden by `REBALANCER_*` environment variables. A `.env`
    /// file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("REBALANCER_PORTFOLIO_DIR") {
            config.scheduler.portfolio_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("REBALANCER_RESULTS_DIR") {
            config.scheduler.results_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "REBALANCER_DELAY_SECS")? {
            config.scheduler.delay_between = Duration::from_secs(secs);
        }

        if let Some(amount) = parse_var(&lookup, "REBALANCER_TOTAL_INVESTMENT")? {
            config.allocation.total_investment = amount;
        }
        if let Some(fractional) = parse_var(&lookup, "REBALANCER_ALLOW_FRACTIONAL")? {
            config.allocation.allow_fractional = fractional;
        }
        if let Some(top_n) = parse_var(&lookup, "REBALANCER_TOP_N")? {
            config.allocation.top_n = top_n;
        }

        if let Some(days) = parse_var(&lookup, "REBALANCER_INTERVAL_DAYS")? {
            config.tactics.rebalance_interval_days = days;
        }
        if let Some(threshold) = parse_var(&lookup, "REBALANCER_DROP_THRESHOLD")? {
            config.tactics.trigger_drop_threshold = threshold;
        }

        if let Some(path) = lookup("REBALANCER_AI_PREDICTIONS") {
            config.inputs.ai_predictions = PathBuf::from(path);
        }
        if let Some(path) = lookup("REBALANCER_NEWS_PREDICTIONS") {
            config.inputs.news_predictions = PathBuf::from(path);
        }
        if let Some(path) = lookup("REBALANCER_UNIVERSE_CACHE") {
            config.inputs.universe_cache = PathBuf::from(path);
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("Invalid {}", key)))
        .transpose()
}
