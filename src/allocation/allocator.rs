//! Growth-weighted allocator for ranked candidates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::api::{PriceFeed, PriceMap};
use crate::models::Candidate;

use super::{size_holdings, Allocation, AllocationError, Holding};

/// Allocates capital in proportion to each candidate's predicted growth.
pub struct Allocator {
    feed: PriceFeed,
}

struct Merged {
    growth_sum: Decimal,
    count: u32,
    last_close: Decimal,
}

impl Allocator {
    pub fn new(feed: PriceFeed) -> Self {
        Self { feed }
    }

    /// Allocate `total_investment` across the positive-growth candidates,
    /// pricing them from the live feed. A failed fetch or a missing ticker
    /// falls back to the candidate's last close.
    pub async fn allocate(
        &self,
        candidates: &[Candidate],
        total_investment: Decimal,
        allow_fractional: bool,
    ) -> Result<Allocation, AllocationError> {
        let kept = positive_candidates(candidates);
        if kept.is_empty() {
            return Err(AllocationError::NoPositiveCandidates);
        }

        let tickers: Vec<String> = kept.iter().map(|c| c.ticker.clone()).collect();
        let prices = match self.feed.fetch_once(&tickers).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(error = %e, "Price fetch failed, using last close for every candidate");
                PriceMap::new()
            }
        };

        Self::allocate_with_prices(candidates, total_investment, allow_fractional, &prices)
    }

    /// Deterministic core of [`Allocator::allocate`] given resolved prices.
    pub fn allocate_with_prices(
        candidates: &[Candidate],
        total_investment: Decimal,
        allow_fractional: bool,
        prices: &PriceMap,
    ) -> Result<Allocation, AllocationError> {
        if total_investment <= Decimal::ZERO {
            return Err(AllocationError::InvalidInvestment(total_investment));
        }

        let kept = positive_candidates(candidates);
        if kept.is_empty() {
            return Err(AllocationError::NoPositiveCandidates);
        }

        let growth_total: Decimal = kept.iter().map(|c| c.predicted_growth).sum();

        let holdings: Vec<Holding> = kept
            .into_iter()
            .map(|c| {
                let weight = c.predicted_growth / growth_total;
                let price = match prices.get(&c.ticker) {
                    Some(p) if *p > Decimal::ZERO => *p,
                    _ => {
                        debug!(ticker = %c.ticker, last_close = %c.last_close, "No live price, using last close");
                        c.last_close
                    }
                };
                Holding {
                    ticker: c.ticker,
                    weight,
                    investment: weight * total_investment,
                    price,
                }
            })
            .collect();

        let sized = size_holdings(holdings, total_investment, allow_fractional);
        let allocation = Allocation {
            entries: sized.entries,
            total_investment,
            dust: sized.dust,
            fractional: allow_fractional,
        };

        info!(
            holdings = allocation.entries.len(),
            value = %allocation.total_value(),
            dust = %allocation.dust,
            "Portfolio allocated"
        );

        Ok(allocation)
    }
}

/// Merge duplicate tickers (mean growth, latest close) and keep the ones
/// with positive growth, in ticker order.
fn positive_candidates(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut merged: BTreeMap<&str, Merged> = BTreeMap::new();

    for c in candidates {
        let entry = merged.entry(c.ticker.as_str()).or_insert(Merged {
            growth_sum: Decimal::ZERO,
            count: 0,
            last_close: c.last_close,
        });
        entry.growth_sum += c.predicted_growth;
        entry.count += 1;
        entry.last_close = c.last_close;
    }

    merged
        .into_iter()
        .map(|(ticker, m)| Candidate::new(ticker, m.growth_sum / Decimal::from(m.count), m.last_close))
        .filter(|c| c.is_positive())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockPriceSource;
    use crate::api::RetryPolicy;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn scenario_candidates() -> Vec<Candidate> {
        vec![
            Candidate::new("A", dec!(0.10), dec!(100)),
            Candidate::new("B", dec!(0.05), dec!(50)),
        ]
    }

    fn feed(source: MockPriceSource) -> PriceFeed {
        PriceFeed::new(Arc::new(source), RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn test_fractional_allocation_with_failed_price_fetch() {
        let allocator = Allocator::new(feed(MockPriceSource::unavailable()));

        let allocation = allocator
            .allocate(&scenario_candidates(), dec!(1000), true)
            .await
            .unwrap();

        let a = &allocation.entries[0];
        let b = &allocation.entries[1];
        assert_eq!(a.ticker, "A");
        assert_eq!(a.weight, dec!(0.6667));
        assert_eq!(b.weight, dec!(0.3333));
        assert_eq!(a.investment, dec!(666.67));
        assert_eq!(b.investment, dec!(333.33));
        assert_eq!(a.price, dec!(100));
        assert_eq!(b.price, dec!(50));
        assert_eq!(a.shares, dec!(6.6667));
        assert_eq!(b.shares, dec!(6.6667));
        assert_eq!(allocation.total_value(), dec!(1000.00));
        assert_eq!(allocation.dust, Decimal::ZERO);
    }

    #[test]
    fn test_whole_share_allocation_leaves_dust() {
        let prices: PriceMap = [("A".to_string(), dec!(100)), ("B".to_string(), dec!(50))]
            .into_iter()
            .collect();

        let allocation =
            Allocator::allocate_with_prices(&scenario_candidates(), dec!(1000), false, &prices).unwrap();

        assert_eq!(allocation.entries[0].shares, dec!(6));
        assert_eq!(allocation.entries[1].shares, dec!(6));
        assert_eq!(allocation.dust, dec!(100));
        assert!(allocation.dust >= Decimal::ZERO);
    }

    #[test]
    fn test_live_price_overrides_last_close() {
        let prices: PriceMap = [("A".to_string(), dec!(200))].into_iter().collect();

        let allocation =
            Allocator::allocate_with_prices(&scenario_candidates(), dec!(1000), true, &prices).unwrap();

        assert_eq!(allocation.entries[0].price, dec!(200));
        assert_eq!(allocation.entries[0].shares, dec!(3.3333));
        assert_eq!(allocation.entries[1].price, dec!(50));
    }

    #[test]
    fn test_no_positive_candidates() {
        let candidates = vec![
            Candidate::new("A", dec!(-0.02), dec!(100)),
            Candidate::new("B", Decimal::ZERO, dec!(50)),
        ];

        let result = Allocator::allocate_with_prices(&candidates, dec!(1000), true, &PriceMap::new());
        assert_eq!(result.unwrap_err(), AllocationError::NoPositiveCandidates);

        let result = Allocator::allocate_with_prices(&[], dec!(1000), true, &PriceMap::new());
        assert_eq!(result.unwrap_err(), AllocationError::NoPositiveCandidates);
    }

    #[test]
    fn test_non_positive_investment_is_rejected() {
        let result =
            Allocator::allocate_with_prices(&scenario_candidates(), Decimal::ZERO, true, &PriceMap::new());
        assert_eq!(result.unwrap_err(), AllocationError::InvalidInvestment(Decimal::ZERO));
    }

    #[test]
    fn test_duplicates_are_averaged_before_weighting() {
        let candidates = vec![
            Candidate::new("A", dec!(0.10), dec!(90)),
            Candidate::new("B", dec!(0.10), dec!(50)),
            Candidate::new("A", dec!(0.30), dec!(100)),
        ];

        let allocation =
            Allocator::allocate_with_prices(&candidates, dec!(1000), true, &PriceMap::new()).unwrap();

        assert_eq!(allocation.entries.len(), 2);
        // mean growth of A is 0.20 against 0.10 for B
        assert_eq!(allocation.entries[0].weight, dec!(0.6667));
        assert_eq!(allocation.entries[0].price, dec!(100));
    }

    #[test]
    fn test_weights_sum_to_one() {
        let candidates: Vec<Candidate> = [
            ("AAPL", dec!(0.031), dec!(227.5)),
            ("MSFT", dec!(0.012), dec!(410.2)),
            ("NVDA", dec!(0.087), dec!(121.4)),
            ("AMZN", dec!(0.004), dec!(186.9)),
            ("META", dec!(-0.020), dec!(560.0)),
            ("TSLA", dec!(0.055), dec!(250.1)),
        ]
        .into_iter()
        .map(|(t, g, p)| Candidate::new(t, g, p))
        .collect();

        let allocation =
            Allocator::allocate_with_prices(&candidates, dec!(10000), true, &PriceMap::new()).unwrap();

        assert_eq!(allocation.entries.len(), 5);
        assert!((allocation.total_weight() - Decimal::ONE).abs() <= dec!(0.0001));
        let invested: Decimal = allocation.entries.iter().map(|e| e.investment).sum();
        assert!((allocation.total_value() - invested).abs() <= dec!(0.05));
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let prices: PriceMap = [("A".to_string(), dec!(101.37))].into_iter().collect();

        let first =
            Allocator::allocate_with_prices(&scenario_candidates(), dec!(5000), false, &prices).unwrap();
        let second =
            Allocator::allocate_with_prices(&scenario_candidates(), dec!(5000), false, &prices).unwrap();

        assert_eq!(first, second);
    }
}
