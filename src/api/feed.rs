//! Price feed: a price source paired with the retry policy that governs it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{PriceError, PriceMap, PriceSource, RetryPolicy};

/// Price resolution used by the allocators and the valuation step.
#[derive(Clone)]
pub struct PriceFeed {
    source: Arc<dyn PriceSource>,
    retry: RetryPolicy,
}

impl PriceFeed {
    pub fn new(source: Arc<dyn PriceSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Single bulk attempt, no retries.
    pub async fn fetch_once(&self, tickers: &[String]) -> Result<PriceMap, PriceError> {
        debug!(source = self.source.name(), count = tickers.len(), "Fetching prices");
        self.source.latest_prices(tickers).await
    }

    /// Bulk fetch, retried according to the policy.
    pub async fn fetch_with_retry(&self, tickers: &[String]) -> Result<PriceMap, PriceError> {
        self.retry
            .run("bulk price fetch", || self.source.latest_prices(tickers))
            .await
    }

    /// Bulk fetch with retries; once the retries are exhausted, fetch each
    /// ticker on its own and skip the ones that fail. Never fails outright,
    /// the result may simply be missing tickers.
    pub async fn fetch_with_fallback(&self, tickers: &[String]) -> PriceMap {
        match self.fetch_with_retry(tickers).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(error = %e, "Bulk price fetch failed, falling back to per-ticker requests");
                let mut prices = PriceMap::new();
                for ticker in tickers {
                    match self.source.latest_price(ticker).await {
                        Ok(Some(price)) => {
                            prices.insert(ticker.clone(), price);
                        }
                        Ok(None) => debug!(ticker = %ticker, "No price data"),
                        Err(e) => debug!(ticker = %ticker, error = %e, "Price fetch failed"),
                    }
                }
                info!(resolved = prices.len(), requested = tickers.len(), "Per-ticker fallback finished");
                prices
            }
        }
    }
}
