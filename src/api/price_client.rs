//! Yahoo Finance client used as the live price source: the spark endpoint
//! for batches, the chart endpoint for single symbols.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::types::{ChartResponse, SparkResponse};
use super::{PriceError, PriceMap, PriceSource};

const CHART_API_BASE: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Symbols per spark request; the endpoint rejects larger lists.
const SPARK_BATCH_SIZE: usize = 20;

/// Spark requests in flight when a fetch spans several batches.
const SPARK_CONCURRENCY: usize = 2;

/// Client for the public chart endpoint (read-only).
pub struct YahooPriceClient {
    client: Client,
    base_url: String,
}

impl YahooPriceClient {
    /// Create a new price client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_base_url(CHART_API_BASE.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Fetch the latest daily close for one symbol.
    async fn fetch_close(&self, ticker: &str) -> Result<Option<Decimal>, PriceError> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1d",
            self.base_url, ticker
        );

        debug!(url = %url, "Fetching chart");

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PriceError::Unavailable(format!(
                "chart request for {} failed: {} - {}",
                ticker, status, body
            )));
        }

        let parsed: ChartResponse = response.json().await?;

        if let Some(err) = parsed.chart.error {
            debug!(ticker = %ticker, code = %err.code, "Chart API returned an error");
            return Ok(None);
        }

        Ok(parsed
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .and_then(|r| r.latest_close()))
    }

    /// Fetch the latest closes for up to [`SPARK_BATCH_SIZE`] symbols in one
    /// request. Symbols the endpoint does not know are left out.
    async fn fetch_spark(&self, tickers: &[String]) -> Result<PriceMap, PriceError> {
        let url = format!("{}/v7/finance/spark", self.base_url);
        let symbols = tickers.join(",");

        debug!(url = %url, symbols = %symbols, "Fetching spark batch");

        let response = self
            .client
            .get(&url)
            .query(&[("symbols", symbols.as_str()), ("range", "1d"), ("interval", "1d")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PriceError::Unavailable(format!(
                "spark request for {} symbols failed: {} - {}",
                tickers.len(),
                status,
                body
            )));
        }

        let parsed: SparkResponse = response.json().await?;

        if let Some(err) = parsed.spark.error {
            return Err(PriceError::Unavailable(format!("spark API error: {}", err.code)));
        }

        Ok(parsed.spark.closes())
    }
}

#[async_trait]
impl PriceSource for YahooPriceClient {
    async fn latest_prices(&self, tickers: &[String]) -> Result<PriceMap, PriceError> {
        if tickers.is_empty() {
            return Ok(PriceMap::new());
        }

        let requests: Vec<_> = tickers
            .chunks(SPARK_BATCH_SIZE)
            .map(|batch| self.fetch_spark(batch))
            .collect();
        let batches: Vec<Result<PriceMap, PriceError>> = stream::iter(requests)
            .buffer_unordered(SPARK_CONCURRENCY)
            .collect()
            .await;

        let batch_count = batches.len();
        let mut prices = PriceMap::new();
        let mut failures = 0usize;
        let mut last_error = None;

        for batch in batches {
            match batch {
                Ok(found) => prices.extend(found),
                Err(e) => {
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        // Partial answers are fine; a wholesale transport failure is not.
        if failures == batch_count {
            return Err(last_error
                .unwrap_or_else(|| PriceError::Unavailable("all spark requests failed".to_string())));
        }
        if failures > 0 {
            warn!(failed = failures, batches = batch_count, "Some spark requests failed");
        }

        let missing = tickers.len() - prices.len().min(tickers.len());
        if missing > 0 {
            debug!(missing = missing, requested = tickers.len(), "No price data for some symbols");
        }

        Ok(prices)
    }

    async fn latest_price(&self, ticker: &str) -> Result<Option<Decimal>, PriceError> {
        self.fetch_close(ticker).await
    }

    fn name(&self) -> &str {
        "yahoo-chart"
    }
}
