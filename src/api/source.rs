//! Price source abstraction.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Latest close price per ticker.
pub type PriceMap = HashMap<String, Decimal>;

/// Errors raised by a price source.
#[derive(Debug, Error)]
pub enum PriceError {
    /// The source could not be reached or returned nothing usable
    #[error("price source unavailable: {0}")]
    Unavailable(String),

    #[error("price request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source of latest close prices.
///
/// Implementations may omit tickers they have no data for; callers decide
/// the fallback (last known close, stored price, or exclusion).
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch prices for many tickers in one logical call.
    async fn latest_prices(&self, tickers: &[String]) -> Result<PriceMap, PriceError>;

    /// Fetch the price of a single ticker. `Ok(None)` when the source has no data.
    async fn latest_price(&self, ticker: &str) -> Result<Option<Decimal>, PriceError>;

    /// Source name for logging
    fn name(&self) -> &str;
}
