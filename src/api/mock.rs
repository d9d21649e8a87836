//! In-memory price source for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{PriceError, PriceMap, PriceSource};

/// Price source backed by a fixed map, with switchable failures.
#[derive(Debug, Default)]
pub struct MockPriceSource {
    prices: Mutex<PriceMap>,
    bulk_failures_left: AtomicU32,
    failing_tickers: HashSet<String>,
    bulk_calls: AtomicU32,
    single_calls: AtomicU32,
}

impl MockPriceSource {
    pub fn new(prices: &[(&str, Decimal)]) -> Self {
        Self {
            prices: Mutex::new(prices.iter().map(|(t, p)| (t.to_string(), *p)).collect()),
            ..Default::default()
        }
    }

    /// Source whose bulk and single fetches always fail.
    pub fn unavailable() -> Self {
        Self::new(&[]).failing_bulk_times(u32::MAX)
    }

    /// Fail the next `n` bulk fetches.
    pub fn failing_bulk_times(self, n: u32) -> Self {
        self.bulk_failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Fail single fetches for `ticker`.
    pub fn failing_ticker(mut self, ticker: &str) -> Self {
        self.failing_tickers.insert(ticker.to_string());
        self
    }

    /// Replace the price of `ticker`.
    pub fn set_price(&self, ticker: &str, price: Decimal) {
        if let Ok(mut prices) = self.prices.lock() {
            prices.insert(ticker.to_string(), price);
        }
    }

    pub fn bulk_calls(&self) -> u32 {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> u32 {
        self.single_calls.load(Ordering::SeqCst)
    }

    fn everything_down(&self) -> bool {
        self.bulk_failures_left.load(Ordering::SeqCst) == u32::MAX
            && self.prices.lock().map(|p| p.is_empty()).unwrap_or(true)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn latest_prices(&self, tickers: &[String]) -> Result<PriceMap, PriceError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);

        let left = self.bulk_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != u32::MAX {
                self.bulk_failures_left.store(left - 1, Ordering::SeqCst);
            }
            return Err(PriceError::Unavailable("mock bulk failure".to_string()));
        }

        let prices = self
            .prices
            .lock()
            .map_err(|_| PriceError::Unavailable("poisoned".to_string()))?;
        Ok(tickers
            .iter()
            .filter_map(|t| prices.get(t).map(|p| (t.clone(), *p)))
            .collect())
    }

    async fn latest_price(&self, ticker: &str) -> Result<Option<Decimal>, PriceError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_tickers.contains(ticker) || self.everything_down() {
            return Err(PriceError::Unavailable(format!("mock failure for {}", ticker)));
        }

        let prices = self
            .prices
            .lock()
            .map_err(|_| PriceError::Unavailable("poisoned".to_string()))?;
        Ok(prices.get(ticker).copied())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
