//! Portfolio Rebalancer
//!
//! Builds simulated stock portfolios from ranked candidates and keeps them
//! revalued under STATIC, REGULAR or TRIGGER rebalancing tactics.

mod allocation;
mod api;
mod config;
mod generator;
mod models;
mod rebalancing;
mod scheduler;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::allocation::CsvCandidateSource;
use crate::api::{PriceFeed, PriceSource, UniverseClient, YahooPriceClient};
use crate::config::AppConfig;
use crate::generator::PortfolioGenerator;
use crate::scheduler::{CycleReport, Scheduler};
use crate::store::PortfolioStore;

/// Portfolio allocation and rebalancing CLI.
#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Build simulated portfolios and keep them rebalanced", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory holding the portfolio files
    #[arg(long)]
    portfolio_dir: Option<PathBuf>,

    /// Directory for the history logs
    #[arg(long)]
    results_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create portfolios for every strategy and tactic
    Generate {
        /// Overwrite portfolios that already exist
        #[arg(long)]
        force: bool,

        /// Seed for the random strategy (defaults to the current Unix time)
        #[arg(long)]
        seed: Option<u64>,

        /// Capital per portfolio
        #[arg(short, long)]
        investment: Option<Decimal>,

        /// Buy whole shares only, leaving dust
        #[arg(long)]
        whole_shares: bool,

        /// Growth model output file
        #[arg(long)]
        ai_predictions: Option<PathBuf>,

        /// Sentiment model output file
        #[arg(long)]
        news_predictions: Option<PathBuf>,
    },

    /// Revalue every portfolio and apply its tactic
    Update {
        /// Keep running, one pass every N hours
        #[arg(long)]
        every_hours: Option<u64>,

        /// Seconds to wait between portfolios
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Append history rows without touching portfolio files
    Snapshot,

    /// List stored portfolios
    List,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.portfolio_dir {
        config.scheduler.portfolio_dir = dir;
    }
    if let Some(dir) = cli.results_dir {
        config.scheduler.results_dir = dir;
    }

    match cli.command {
        Commands::Generate {
            force,
            seed,
            investment,
            whole_shares,
            ai_predictions,
            news_predictions,
        } => {
            if let Some(amount) = investment {
                config.allocation.total_investment = amount;
            }
            if whole_shares {
                config.allocation.allow_fractional = false;
            }
            if let Some(path) = ai_predictions {
                config.inputs.ai_predictions = path;
            }
            if let Some(path) = news_predictions {
                config.inputs.news_predictions = path;
            }

            let seed = seed.unwrap_or_else(|| u64::try_from(Utc::now().timestamp()).unwrap_or_default());
            info!(
                investment = %config.allocation.total_investment,
                fractional = config.allocation.allow_fractional,
                seed = seed,
                "Generating portfolios"
            );

            let companies = UniverseClient::new(&config.inputs.universe_cache)?
                .load()
                .await
                .context("Failed to load the candidate universe")?;
            let universe: Vec<String> = companies.into_iter().map(|c| c.ticker).collect();

            let ai = CsvCandidateSource::new("AI", &config.inputs.ai_predictions);
            let news = CsvCandidateSource::new("NEWS", &config.inputs.news_predictions);

            let generator = PortfolioGenerator::new(
                PortfolioStore::new(&config.scheduler.portfolio_dir),
                price_feed(&config)?,
                config.allocation.clone(),
            )
            .force(force);

            let report = generator.run(&[&ai, &news], &universe, seed).await?;

            println!("\n=== Generation ===");
            println!("Universe:  {} tickers", universe.len());
            println!("Seed:      {}", seed);
            for id in &report.created {
                println!("  created  {}", id.file_name());
            }
            for id in &report.kept {
                println!("  kept     {}", id.file_name());
            }
            for strategy in &report.skipped_strategies {
                println!("  skipped  {} (nothing to allocate)", strategy);
            }
        }

        Commands::Update { every_hours, delay } => {
            if let Some(secs) = delay {
                config.scheduler.delay_between = Duration::from_secs(secs);
            }

            let scheduler = Scheduler::new(config.scheduler.clone(), price_feed(&config)?, config.tactics.clone());

            match every_hours {
                None => {
                    let report = scheduler.run_cycle().await?;
                    print_report("Update", &report);
                }
                Some(hours) => {
                    println!("\n=== Portfolio Scheduler ===");
                    println!("Portfolios: {}", config.scheduler.portfolio_dir.display());
                    println!("Interval:   {}h", hours);
                    println!("\nPress Ctrl+C to stop.\n");

                    let mut ticker = tokio::time::interval(Duration::from_secs(hours.max(1) * 3600));
                    loop {
                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => {
                                println!("\nStopping scheduler...");
                                break;
                            }
                            _ = ticker.tick() => {
                                match scheduler.run_cycle().await {
                                    Ok(report) => print_report("Update", &report),
                                    Err(e) => error!(error = %e, "Update pass failed"),
                                }
                            }
                        }
                    }
                }
            }
        }

        Commands::Snapshot => {
            let scheduler = Scheduler::new(config.scheduler.clone(), price_feed(&config)?, config.tactics.clone());
            let report = scheduler.record_snapshots().await?;
            print_report("Snapshot", &report);
        }

        Commands::List => {
            let store = PortfolioStore::new(&config.scheduler.portfolio_dir);
            let files = store.list()?;

            if files.is_empty() {
                println!("No portfolios found. Use 'rebalancer generate' to create them.");
                return Ok(());
            }

            println!(
                "\n{:<22} {:>8} {:>12} {:>12} {:>9} {:>17}",
                "PORTFOLIO", "HOLDINGS", "VALUE", "START", "CHANGE", "UPDATED"
            );
            println!("{}", "-".repeat(85));

            for path in files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                match store.load(&path) {
                    Ok(p) => {
                        let value = p.net_value();
                        let (start, change) = match p.start_value {
                            Some(start) if !start.is_zero() => (
                                format!("{:.2}", start),
                                format!("{:+.2}%", (value / start - Decimal::ONE) * Decimal::ONE_HUNDRED),
                            ),
                            _ => ("-".to_string(), "-".to_string()),
                        };
                        println!(
                            "{:<22} {:>8} {:>12.2} {:>12} {:>9} {:>17}",
                            truncate(&name, 22),
                            p.entries.len(),
                            value,
                            start,
                            change,
                            p.last_updated_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                    Err(e) => println!("{:<22} unreadable: {}", truncate(&name, 22), e),
                }
            }
        }

        Commands::Config => {
            let a = &config.allocation;
            let t = &config.tactics;
            let r = &config.retry;
            let s = &config.scheduler;

            println!("\n=== Allocation ===\n");
            println!("  Total Investment:     ${}", a.total_investment);
            println!("  Fractional Shares:    {}", a.allow_fractional);
            println!("  Top N Candidates:     {}", a.top_n);
            println!("  Random Holdings:      {}-{}", a.random_min_holdings, a.random_max_holdings);

            println!("\n=== Tactics ===\n");
            println!("  Regular Interval:     {} days", t.rebalance_interval_days);
            println!("  Trigger Drop:         {}%", t.trigger_drop_threshold * Decimal::ONE_HUNDRED);

            println!("\n=== Price Fetch ===\n");
            println!("  Max Attempts:         {}", r.max_attempts);
            println!("  Retry Delay:          {:?} (jitter {:.0}%)", r.base_delay, r.jitter * 100.0);

            println!("\n=== Files ===\n");
            println!("  Portfolios:           {}", s.portfolio_dir.display());
            println!("  History:              {}", s.results_dir.display());
            println!("  Delay Between:        {:?}", s.delay_between);
            println!("  AI Predictions:       {}", config.inputs.ai_predictions.display());
            println!("  News Predictions:     {}", config.inputs.news_predictions.display());
            println!("  Universe Cache:       {}", config.inputs.universe_cache.display());
        }
    }

    Ok(())
}

/// Live price feed with the configured retry policy.
fn price_feed(config: &AppConfig) -> Result<PriceFeed> {
    let source: Arc<dyn PriceSource> = Arc::new(YahooPriceClient::new()?);
    Ok(PriceFeed::new(source, config.retry.clone()))
}

fn print_report(pass: &str, report: &CycleReport) {
    println!("\n=== {} ===", pass);
    println!("Updated:    {}", report.updated);
    println!("Rebalanced: {}", report.rebalanced);
    println!("Skipped:    {}", report.skipped);
    println!("Failed:     {}", report.failed);
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
