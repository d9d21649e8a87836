//! Random baseline allocator: a random subset of the universe with random
//! weights.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::{PriceFeed, PriceMap};

use super::{size_holdings, Allocation, AllocationConfig, AllocationError, Holding};

/// Picks `n` distinct tickers (n uniform in the configured range) and
/// weights them randomly. Reproducible when a seed is supplied.
pub struct RandomAllocator {
    feed: PriceFeed,
    min_holdings: usize,
    max_holdings: usize,
}

impl RandomAllocator {
    pub fn new(feed: PriceFeed, config: &AllocationConfig) -> Self {
        let min_holdings = config.random_min_holdings.max(1);
        Self {
            feed,
            min_holdings,
            max_holdings: config.random_max_holdings.max(min_holdings),
        }
    }

    /// Draw the selection and its weights. Weights sum to one.
    pub fn draw(&self, universe: &[String], rng: &mut impl Rng) -> Result<Vec<(String, Decimal)>, AllocationError> {
        let distinct: Vec<&String> = universe.iter().collect::<BTreeSet<_>>().into_iter().collect();
        if distinct.is_empty() {
            return Err(AllocationError::EmptyUniverse);
        }

        let n = rng
            .gen_range(self.min_holdings..=self.max_holdings)
            .min(distinct.len());

        let picked: Vec<String> = index::sample(rng, distinct.len(), n)
            .into_iter()
            .map(|i| distinct[i].clone())
            .collect();

        let raw: Vec<Decimal> = (0..n)
            .map(|_| Decimal::try_from(rng.gen::<f64>()).unwrap_or(Decimal::ZERO))
            .collect();
        let sum: Decimal = raw.iter().copied().sum();

        let weights: Vec<Decimal> = if sum.is_zero() {
            vec![Decimal::ONE / Decimal::from(n); n]
        } else {
            raw.into_iter().map(|w| w / sum).collect()
        };

        Ok(picked.into_iter().zip(weights).collect())
    }

    /// Build a random portfolio from `universe`. Prices come from the feed
    /// with retries and a per-ticker fallback; tickers that still have no
    /// price are dropped.
    pub async fn allocate(
        &self,
        universe: &[String],
        total_investment: Decimal,
        allow_fractional: bool,
        seed: Option<u64>,
    ) -> Result<Allocation, AllocationError> {
        if total_investment <= Decimal::ZERO {
            return Err(AllocationError::InvalidInvestment(total_investment));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let selection = self.draw(universe, &mut rng)?;
        let tickers: Vec<String> = selection.iter().map(|(t, _)| t.clone()).collect();
        info!(count = tickers.len(), seed = ?seed, "Random selection drawn");

        let prices = self.feed.fetch_with_fallback(&tickers).await;

        Self::allocate_with_prices(selection, total_investment, allow_fractional, &prices)
    }

    /// Size a drawn selection with resolved prices.
    ///
    /// Dropped tickers take their weight with them: the remaining weights
    /// are not renormalized, so their sum (and the invested capital) can
    /// fall below the total.
    pub fn allocate_with_prices(
        selection: Vec<(String, Decimal)>,
        total_investment: Decimal,
        allow_fractional: bool,
        prices: &PriceMap,
    ) -> Result<Allocation, AllocationError> {
        let (priced, missing): (Vec<_>, Vec<_>) = selection
            .into_iter()
            .partition(|(t, _)| prices.get(t).is_some_and(|p| *p > Decimal::ZERO));

        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|(t, _)| t.as_str()).collect();
            warn!(missing = %names.join(", "), "No price data, dropping tickers");
        }
        if priced.is_empty() {
            return Err(AllocationError::NoPricedHoldings);
        }

        let holdings: Vec<Holding> = priced
            .into_iter()
            .filter_map(|(ticker, weight)| {
                let price = *prices.get(&ticker)?;
                Some(Holding {
                    ticker,
                    weight,
                    investment: weight * total_investment,
                    price,
                })
            })
            .collect();

        let sized = size_holdings(holdings, total_investment, allow_fractional);

        Ok(Allocation {
            entries: sized.entries,
            total_investment,
            dust: sized.dust,
            fractional: allow_fractional,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockPriceSource;
    use crate::api::RetryPolicy;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn universe(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{:02}", i)).collect()
    }

    fn priced_source(tickers: &[String]) -> MockPriceSource {
        let pairs: Vec<(&str, Decimal)> = tickers.iter().map(|t| (t.as_str(), dec!(25))).collect();
        MockPriceSource::new(&pairs)
    }

    fn allocator(source: MockPriceSource) -> RandomAllocator {
        let feed = PriceFeed::new(Arc::new(source), RetryPolicy::immediate(3));
        RandomAllocator::new(feed, &AllocationConfig::default())
    }

    #[test]
    fn test_draw_respects_bounds_and_normalizes() {
        let tickers = universe(100);
        let alloc = allocator(MockPriceSource::new(&[]));
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let selection = alloc.draw(&tickers, &mut rng).unwrap();
            assert!((5..=20).contains(&selection.len()));

            let distinct: BTreeSet<&String> = selection.iter().map(|(t, _)| t).collect();
            assert_eq!(distinct.len(), selection.len());

            let total: Decimal = selection.iter().map(|(_, w)| *w).sum();
            assert!((total - Decimal::ONE).abs() < dec!(0.000001));
            assert!(selection.iter().all(|(_, w)| *w >= Decimal::ZERO));
        }
    }

    #[test]
    fn test_draw_caps_at_universe_size() {
        let tickers = universe(3);
        let alloc = allocator(MockPriceSource::new(&[]));
        let mut rng = StdRng::seed_from_u64(1);

        let selection = alloc.draw(&tickers, &mut rng).unwrap();
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn test_draw_empty_universe() {
        let alloc = allocator(MockPriceSource::new(&[]));
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(alloc.draw(&[], &mut rng).unwrap_err(), AllocationError::EmptyUniverse);
    }

    #[tokio::test]
    async fn test_seeded_allocation_is_reproducible() {
        let tickers = universe(60);

        let first = allocator(priced_source(&tickers))
            .allocate(&tickers, dec!(10000), true, Some(42))
            .await
            .unwrap();
        let second = allocator(priced_source(&tickers))
            .allocate(&tickers, dec!(10000), true, Some(42))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.dust, Decimal::ZERO);
        assert!((first.total_weight() - Decimal::ONE).abs() <= dec!(0.001));
    }

    #[tokio::test]
    async fn test_bulk_failure_falls_back_to_single_fetches() {
        let tickers = universe(30);
        let source = Arc::new(priced_source(&tickers).failing_bulk_times(u32::MAX));
        let feed = PriceFeed::new(source.clone(), RetryPolicy::immediate(3));
        let alloc = RandomAllocator::new(feed, &AllocationConfig::default());

        let allocation = alloc.allocate(&tickers, dec!(10000), false, Some(3)).await.unwrap();

        assert_eq!(source.bulk_calls(), 3);
        assert_eq!(source.single_calls() as usize, allocation.entries.len());
        for e in &allocation.entries {
            assert_eq!(e.shares, e.shares.trunc());
        }
        let spent: Decimal = allocation.entries.iter().map(|e| e.shares * e.price).sum();
        assert_eq!(allocation.dust, dec!(10000) - spent);
    }

    #[test]
    fn test_missing_prices_are_dropped_without_renormalizing() {
        let selection = vec![
            ("A".to_string(), dec!(0.5)),
            ("B".to_string(), dec!(0.3)),
            ("C".to_string(), dec!(0.2)),
        ];
        let prices: PriceMap = [("A".to_string(), dec!(10)), ("C".to_string(), dec!(20))]
            .into_iter()
            .collect();

        let allocation =
            RandomAllocator::allocate_with_prices(selection, dec!(1000), true, &prices).unwrap();

        assert_eq!(allocation.entries.len(), 2);
        assert_eq!(allocation.total_weight(), dec!(0.7));
        assert_eq!(allocation.total_value(), dec!(700));
        assert_eq!(allocation.dust, Decimal::ZERO);
    }

    #[test]
    fn test_nothing_priced() {
        let selection = vec![("A".to_string(), Decimal::ONE)];

        let result = RandomAllocator::allocate_with_prices(selection, dec!(1000), true, &PriceMap::new());
        assert_eq!(result.unwrap_err(), AllocationError::NoPricedHoldings);
    }
}
