//! Equal-weight reset.

use rust_decimal::Decimal;
use tracing::info;

use crate::allocation::{size_holdings, Holding};
use crate::models::Portfolio;

use super::Valuation;

/// Reset `portfolio` to equal weights across the tickers it currently holds,
/// investing the valuation's total plus any cash at the new prices.
///
/// No ticker is added or brought back. Whole-share portfolios floor the new
/// share counts and keep the leftover as `dust`.
pub fn rebalance(portfolio: &mut Portfolio, valuation: &Valuation) {
    let n = valuation.lines.len();
    if n == 0 {
        return;
    }

    let total = valuation.total_new_value + portfolio.dust;
    let weight = Decimal::ONE / Decimal::from(n);

    let holdings: Vec<Holding> = valuation
        .lines
        .iter()
        .map(|line| Holding {
            ticker: line.ticker.clone(),
            weight,
            investment: weight * total,
            price: line.new_price,
        })
        .collect();

    let sized = size_holdings(holdings, total, portfolio.fractional);

    let mut entries = sized.entries;
    for entry in entries.iter_mut() {
        entry.change_pct = valuation
            .lines
            .iter()
            .find(|l| l.ticker == entry.ticker)
            .map(|l| l.stored_change_pct());
    }

    portfolio.entries = entries;
    portfolio.dust = sized.dust.round_dp(2);

    info!(
        portfolio = %portfolio.id,
        holdings = n,
        value = %total,
        dust = %portfolio.dust,
        "Rebalanced to equal weight"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PriceMap;
    use crate::models::{PortfolioEntry, PortfolioId, Tactic};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn portfolio(fractional: bool) -> Portfolio {
        let now = Utc::now();
        let entry = |ticker: &str, weight: Decimal, price: Decimal, shares: Decimal| PortfolioEntry {
            ticker: String::from(ticker),
            weight,
            investment: price * shares,
            price,
            shares,
            current_value: price * shares,
            change_pct: None,
        };
        Portfolio {
            id: PortfolioId::new("NEWS", Tactic::Regular),
            entries: vec![
                entry("A", dec!(0.7), dec!(70), dec!(10)),
                entry("B", dec!(0.2), dec!(20), dec!(10)),
                entry("C", dec!(0.1), dec!(10), dec!(10)),
            ],
            total_investment: dec!(1000),
            dust: Decimal::ZERO,
            start_value: Some(dec!(1000)),
            fractional,
            created_at: now,
            last_updated_at: now,
        }
    }

    fn unchanged_prices() -> PriceMap {
        [("A", dec!(70)), ("B", dec!(20)), ("C", dec!(10))]
            .into_iter()
            .map(|(t, p)| (t.to_string(), p))
            .collect()
    }

    #[test]
    fn test_rebalance_equalizes_weights() {
        let mut p = portfolio(true);
        let valuation = Valuation::compute(&p, &unchanged_prices());
        rebalance(&mut p, &valuation);

        assert_eq!(p.entries.len(), 3);
        for e in &p.entries {
            assert_eq!(e.weight, dec!(0.3333));
            assert_eq!(e.investment, dec!(333.33));
            assert_eq!(e.change_pct, Some(Decimal::ZERO));
        }
        assert_eq!(p.entries[0].shares, dec!(4.7619));
        assert_eq!(p.entries[2].shares, dec!(33.3333));
        assert!((p.total_value() - dec!(1000)).abs() <= dec!(0.02));
        assert_eq!(p.dust, Decimal::ZERO);
    }

    #[test]
    fn test_whole_share_rebalance_keeps_leftover_as_dust() {
        let mut p = portfolio(false);
        let valuation = Valuation::compute(&p, &unchanged_prices());
        rebalance(&mut p, &valuation);

        // 4 * 70 + 16 * 20 + 33 * 10 = 930
        let shares: Vec<Decimal> = p.entries.iter().map(|e| e.shares).collect();
        assert_eq!(shares, vec![dec!(4), dec!(16), dec!(33)]);
        assert_eq!(p.dust, dec!(70));
        assert_eq!(p.net_value(), dec!(1000));
    }

    #[test]
    fn test_dust_is_reinvested_on_the_next_rebalance() {
        let mut p = portfolio(false);
        for _ in 0..2 {
            let valuation = Valuation::compute(&p, &unchanged_prices());
            rebalance(&mut p, &valuation);
        }

        // 930 held + 70 cash is sized again, not stacked on the old dust
        assert_eq!(p.dust, dec!(70));
        assert_eq!(p.net_value(), dec!(1000));
    }
}
