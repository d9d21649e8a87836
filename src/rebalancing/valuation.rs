//! Valuation step shared by every tactic.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::api::{PriceError, PriceFeed, PriceMap};
use crate::models::Portfolio;

/// One holding revalued at the latest price.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationLine {
    pub ticker: String,
    pub shares: Decimal,
    pub new_price: Decimal,

    /// `(new_price / old_price - 1) * 100`, unrounded. Tactics compare this
    /// exact figure; it is rounded to 2 decimals only when stored.
    pub change_pct: Decimal,

    /// `shares * new_price`
    pub new_value: Decimal,

    /// False when the source had no price and the stored one was kept
    pub priced: bool,
}

impl ValuationLine {
    /// Change as written to the holdings file.
    pub fn stored_change_pct(&self) -> Decimal {
        self.change_pct.round_dp(2)
    }
}

/// A portfolio revalued against fresh prices. Nothing is mutated until
/// [`Valuation::apply`] is called.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub lines: Vec<ValuationLine>,
    pub total_new_value: Decimal,
}

impl Valuation {
    /// Revalue `portfolio` with resolved prices. A ticker missing from
    /// `prices` keeps its stored price (zero change).
    pub fn compute(portfolio: &Portfolio, prices: &PriceMap) -> Self {
        let lines: Vec<ValuationLine> = portfolio
            .entries
            .iter()
            .map(|entry| {
                let (new_price, priced) = match prices.get(&entry.ticker) {
                    Some(p) if *p > Decimal::ZERO => (*p, true),
                    _ => {
                        warn!(
                            portfolio = %portfolio.id,
                            ticker = %entry.ticker,
                            "No price data, keeping stored price"
                        );
                        (entry.price, false)
                    }
                };

                let change_pct = if entry.price > Decimal::ZERO {
                    (new_price / entry.price - Decimal::ONE) * Decimal::ONE_HUNDRED
                } else {
                    Decimal::ZERO
                };

                ValuationLine {
                    ticker: entry.ticker.clone(),
                    shares: entry.shares,
                    new_price,
                    change_pct,
                    new_value: (entry.shares * new_price).round_dp(2),
                    priced,
                }
            })
            .collect();

        let total_new_value = lines.iter().map(|l| l.new_value).sum();

        Self { lines, total_new_value }
    }

    /// Portfolio-level change against the previously stored values, in percent.
    pub fn total_change_pct(&self, previous_value: Decimal) -> Decimal {
        if previous_value.is_zero() {
            return Decimal::ZERO;
        }
        ((self.total_new_value / previous_value - Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
    }

    /// Write new prices, values and changes into the portfolio. Weights,
    /// investment and shares are left as they are.
    pub fn apply(&self, portfolio: &mut Portfolio) {
        for entry in portfolio.entries.iter_mut() {
            if let Some(line) = self.lines.iter().find(|l| l.ticker == entry.ticker) {
                entry.price = line.new_price.round_dp(2);
                entry.current_value = line.new_value;
                entry.change_pct = Some(line.stored_change_pct());
            }
        }
    }
}

/// Fetch prices for every holding (bulk, with retries) and revalue.
///
/// Fails when the source is unreachable after the retries or returns no
/// price at all; the caller skips the portfolio for this cycle.
pub async fn valuate(portfolio: &Portfolio, feed: &PriceFeed) -> Result<Valuation, PriceError> {
    if portfolio.is_empty() {
        return Ok(Valuation {
            lines: Vec::new(),
            total_new_value: Decimal::ZERO,
        });
    }

    let tickers = portfolio.tickers();
    let prices = feed.fetch_with_retry(&tickers).await?;
    if prices.is_empty() {
        return Err(PriceError::Unavailable(format!(
            "no prices returned for {}",
            portfolio.id
        )));
    }

    debug!(portfolio = %portfolio.id, priced = prices.len(), held = tickers.len(), "Prices resolved");
    Ok(Valuation::compute(portfolio, &prices))
}
