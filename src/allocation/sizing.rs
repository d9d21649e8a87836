//! Share sizing shared by every allocation path: shares, dust, per-ticker
//! aggregation and rounding.

use rust_decimal::Decimal;
use tracing::warn;

use crate::models::PortfolioEntry;

/// A weighted holding that has a price but no share count yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub weight: Decimal,
    pub investment: Decimal,
    pub price: Decimal,
}

/// Sized holdings plus the capital whole-share sizing could not spend.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedHoldings {
    pub entries: Vec<PortfolioEntry>,
    pub dust: Decimal,
}

struct Aggregate {
    ticker: String,
    weight: Decimal,
    investment: Decimal,
    price_sum: Decimal,
    price_count: u32,
    shares: Decimal,
    current_value: Decimal,
}

/// Turn weighted, priced holdings into portfolio entries.
///
/// Fractional mode buys `investment / price` shares and leaves no dust.
/// Whole-share mode floors the share count; `dust` is `capital` minus what
/// was actually spent. Duplicate tickers are merged (weights, investment,
/// shares and value summed, price averaged), keeping first-seen order.
/// Holdings without a positive price are dropped.
pub fn size_holdings(holdings: Vec<Holding>, capital: Decimal, fractional: bool) -> SizedHoldings {
    let mut merged: Vec<Aggregate> = Vec::with_capacity(holdings.len());
    let mut spent = Decimal::ZERO;

    for h in holdings {
        if h.price <= Decimal::ZERO {
            warn!(ticker = %h.ticker, price = %h.price, "Dropping holding without a usable price");
            continue;
        }

        let raw_shares = h.investment / h.price;
        let shares = if fractional { raw_shares } else { raw_shares.floor() };
        let value = shares * h.price;
        spent += value;

        match merged.iter_mut().find(|a| a.ticker == h.ticker) {
            Some(agg) => {
                agg.weight += h.weight;
                agg.investment += h.investment;
                agg.price_sum += h.price;
                agg.price_count += 1;
                agg.shares += shares;
                agg.current_value += value;
            }
            None => merged.push(Aggregate {
                ticker: h.ticker,
                weight: h.weight,
                investment: h.investment,
                price_sum: h.price,
                price_count: 1,
                shares,
                current_value: value,
            }),
        }
    }

    let share_dp = if fractional { 4 } else { 0 };
    let entries = merged
        .into_iter()
        .map(|a| PortfolioEntry {
            ticker: a.ticker,
            weight: a.weight.round_dp(4),
            investment: a.investment.round_dp(2),
            price: (a.price_sum / Decimal::from(a.price_count)).round_dp(2),
            shares: a.shares.round_dp(share_dp),
            current_value: a.current_value.round_dp(2),
            change_pct: None,
        })
        .collect();

    let dust = if fractional { Decimal::ZERO } else { capital - spent };

    SizedHoldings { entries, dust }
}
