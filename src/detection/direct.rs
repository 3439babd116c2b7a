//! Direct (same-pair, cross-exchange) arbitrage detection.
//!
//! For a pair quoted on N venues, compares every (buy, sell) ordered pair
//! where buying at the ask on one venue and selling at the bid on another
//! nets a positive spread before fees. The self-arbitrage case (buying and
//! selling on the same venue) is filtered out unconditionally — it can
//! never be a real opportunity and including it would just be comparing a
//! venue's own bid/ask spread against itself (the "known bug in the source"
//! §4.E.1 calls out; here it's a hard filter, not a comment).
//!
//! A candidate only survives to the returned list when `estimated_profit_pct`
//! is positive AND `price_diff_pct` clears `min_profit_threshold_pct` — both
//! conditions from §4.E.1, not just the first.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::fees;
use crate::types::{ArbitrageOpportunity, Exchange, OpportunityKind, OpportunityStatus, Quote};

pub fn detect(
    pair_symbol: &str,
    quotes: &[Quote],
    exchanges: &HashMap<String, Exchange>,
    min_profit_threshold_pct: Decimal,
    max_position_size: Option<Decimal>,
) -> Vec<ArbitrageOpportunity> {
    let mut out = Vec::new();
    let base_asset = pair_symbol.split('/').next().unwrap_or(pair_symbol);

    for buy in quotes {
        for sell in quotes {
            if buy.exchange_code == sell.exchange_code {
                continue;
            }
            if sell.bid <= buy.ask {
                continue;
            }

            let (Some(buy_exchange), Some(sell_exchange)) = (
                exchanges.get(&buy.exchange_code),
                exchanges.get(&sell.exchange_code),
            ) else {
                continue;
            };

            // §4.E.1: max_volume = min(ask_size_buy, bid_size_sell, per_asset_position_cap).
            let mut max_volume = buy.ask_size.min(sell.bid_size);
            if let Some(cap) = max_position_size {
                max_volume = max_volume.min(cap);
            }
            if max_volume <= Decimal::ZERO {
                continue;
            }

            let price_diff_pct = (sell.bid - buy.ask) / buy.ask * Decimal::ONE_HUNDRED;
            if price_diff_pct < min_profit_threshold_pct {
                continue;
            }

            let Some(fee_breakdown) =
                fees::compute(buy_exchange, sell_exchange, base_asset, buy.ask, sell.bid, max_volume)
            else {
                continue;
            };

            let estimated_profit_pct = price_diff_pct - fee_breakdown.total_fees_pct;
            if estimated_profit_pct <= Decimal::ZERO {
                continue;
            }

            out.push(ArbitrageOpportunity {
                id: None,
                timestamp: chrono::Utc::now(),
                kind: OpportunityKind::Direct,
                pair_symbol: pair_symbol.to_string(),
                buy_exchange: buy.exchange_code.clone(),
                sell_exchange: sell.exchange_code.clone(),
                buy_price: buy.ask,
                sell_price: sell.bid,
                price_diff_pct,
                estimated_profit_pct,
                max_volume,
                fees: fee_breakdown,
                status: OpportunityStatus::Detected,
                skip_reason: None,
            });
        }
    }

    out.sort_by(|a, b| b.estimated_profit_pct.cmp(&a.estimated_profit_pct));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn exchange(code: &str, taker_fee: Decimal) -> Exchange {
        Exchange {
            code: code.to_string(),
            name: code.to_string(),
            maker_fee: taker_fee,
            taker_fee,
            withdrawal_fees: HashMap::new(),
            active: true,
        }
    }

    fn exchanges_map() -> HashMap<String, Exchange> {
        let mut m = HashMap::new();
        m.insert("a".to_string(), exchange("a", dec!(0.001)));
        m.insert("b".to_string(), exchange("b", dec!(0.001)));
        m
    }

    #[test]
    fn clear_opportunity_matches_spec_scenario_one() {
        let a = Quote::new("a", "BTC/JPY", Utc::now(), dec!(9_999_000), dec!(10_000_000), dec!(1), dec!(1), None, None).unwrap();
        let b = Quote::new("b", "BTC/JPY", Utc::now(), dec!(10_050_000), dec!(10_051_000), dec!(1), dec!(1), None, None).unwrap();

        let opps = detect("BTC/JPY", &[a, b], &exchanges_map(), dec!(0.3), None);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].buy_exchange, "a");
        assert_eq!(opps[0].sell_exchange, "b");
        assert_eq!(opps[0].price_diff_pct.round_dp(2), dec!(0.50));
        assert_eq!(opps[0].estimated_profit_pct.round_dp(2), dec!(0.30));
    }

    #[test]
    fn eaten_by_fees_yields_no_opportunity() {
        let mut exchanges = HashMap::new();
        exchanges.insert("a".to_string(), exchange("a", dec!(0.003)));
        exchanges.insert("b".to_string(), exchange("b", dec!(0.003)));

        let a = Quote::new("a", "BTC/JPY", Utc::now(), dec!(9_999_000), dec!(10_000_000), dec!(1), dec!(1), None, None).unwrap();
        let b = Quote::new("b", "BTC/JPY", Utc::now(), dec!(10_050_000), dec!(10_051_000), dec!(1), dec!(1), None, None).unwrap();

        let opps = detect("BTC/JPY", &[a, b], &exchanges, dec!(0.3), None);
        assert!(opps.is_empty());
    }

    #[test]
    fn excludes_self_arbitrage() {
        let mut exchanges = HashMap::new();
        exchanges.insert("a".to_string(), exchange("a", dec!(0.001)));

        let q1 = Quote::new("a", "BTC/JPY", Utc::now(), dec!(5_000_000), dec!(5_001_000), dec!(1), dec!(1), None, None).unwrap();

        let opps = detect("BTC/JPY", std::slice::from_ref(&q1), &exchanges, dec!(0.3), None);
        assert!(opps.is_empty());
    }

    #[test]
    fn zero_volume_leg_is_discarded() {
        let a = Quote::new("a", "BTC/JPY", Utc::now(), dec!(9_999_000), dec!(10_000_000), dec!(1), dec!(0), None, None).unwrap();
        let b = Quote::new("b", "BTC/JPY", Utc::now(), dec!(10_050_000), dec!(10_051_000), dec!(1), dec!(1), None, None).unwrap();

        let opps = detect("BTC/JPY", &[a, b], &exchanges_map(), dec!(0.3), None);
        assert!(opps.is_empty());
    }

    #[test]
    fn below_threshold_is_dropped_even_when_profitable() {
        // 0.05% spread, zero fees: profitable but under the 0.3% default threshold.
        let mut exchanges = HashMap::new();
        exchanges.insert("a".to_string(), exchange("a", dec!(0)));
        exchanges.insert("b".to_string(), exchange("b", dec!(0)));

        let a = Quote::new("a", "BTC/JPY", Utc::now(), dec!(9_999_000), dec!(10_000_000), dec!(1), dec!(1), None, None).unwrap();
        let b = Quote::new("b", "BTC/JPY", Utc::now(), dec!(10_005_000), dec!(10_006_000), dec!(1), dec!(1), None, None).unwrap();

        let opps = detect("BTC/JPY", &[a, b], &exchanges, dec!(0.3), None);
        assert!(opps.is_empty());
    }

    #[test]
    fn position_cap_clamps_max_volume_below_book_depth() {
        let a = Quote::new("a", "BTC/JPY", Utc::now(), dec!(9_999_000), dec!(10_000_000), dec!(1), dec!(1), None, None).unwrap();
        let b = Quote::new("b", "BTC/JPY", Utc::now(), dec!(10_050_000), dec!(10_051_000), dec!(1), dec!(1), None, None).unwrap();

        let opps = detect("BTC/JPY", &[a, b], &exchanges_map(), dec!(0.3), Some(dec!(0.25)));
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].max_volume, dec!(0.25));
    }
}
