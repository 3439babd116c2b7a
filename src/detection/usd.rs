//! USD(T)-denominated direct arbitrage: identical math to `direct::detect`,
//! restricted to the USDT-quoted venues (binance, bybit). Kept as a
//! separate strategy rather than folded into `direct` because its quotes
//! carry `ConversionMeta` and its opportunities are reported under a
//! distinct `OpportunityKind` for operator-facing breakdowns.
//!
//! The quotes this strategy is handed have already been converted to JPY by
//! their adapter (§4.C.4) and stored under the `BASE/JPY` canonical pair so
//! `direct::detect` can join them against domestic venues. §4.E.3 requires
//! this strategy's own figures stay in USD, so every candidate quote is
//! rebuilt from `Quote::conversion.original_bid/original_ask` — the
//! pre-conversion USDT prices the adapter preserved exactly for this — not
//! from the already-JPY-converted `bid`/`ask` fields. A quote with no
//! `conversion` attached (shouldn't happen for binance/bybit) is skipped
//! rather than treated as USD-denominated.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::types::{ArbitrageOpportunity, Exchange, OpportunityKind, Quote};

const USD_VENUES: [&str; 2] = ["binance", "bybit"];

pub fn detect(
    pair_symbol: &str,
    quotes: &[Quote],
    exchanges: &HashMap<String, Exchange>,
    min_profit_threshold_pct: Decimal,
    max_position_size: Option<Decimal>,
) -> Vec<ArbitrageOpportunity> {
    let base_asset = pair_symbol.split('/').next().unwrap_or(pair_symbol);
    let usd_pair_symbol = format!("{base_asset}/USDT");

    let filtered: Vec<Quote> = quotes
        .iter()
        .filter(|q| USD_VENUES.contains(&q.exchange_code.as_str()))
        .filter_map(|q| {
            let conversion = q.conversion.as_ref()?;
            let mut usd_quote = q.clone();
            usd_quote.pair_symbol = usd_pair_symbol.clone();
            usd_quote.bid = conversion.original_bid;
            usd_quote.ask = conversion.original_ask;
            usd_quote.conversion = None;
            Some(usd_quote)
        })
        .collect();

    super::direct::detect(
        &usd_pair_symbol,
        &filtered,
        exchanges,
        min_profit_threshold_pct,
        max_position_size,
    )
    .into_iter()
    .map(|mut opp| {
        opp.kind = OpportunityKind::Usd;
        opp
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversionMeta;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn usdt_quote(exchange_code: &str, original_bid: Decimal, original_ask: Decimal, fx_rate: Decimal) -> Quote {
        let mut q = Quote::new(
            exchange_code,
            "BTC/JPY",
            Utc::now(),
            original_bid * fx_rate,
            original_ask * fx_rate,
            dec!(1),
            dec!(1),
            None,
            None,
        )
        .unwrap();
        q.conversion = Some(ConversionMeta {
            original_bid,
            original_ask,
            fx_rate,
        });
        q
    }

    #[test]
    fn restricts_to_usdt_venues_only() {
        let mut exchanges = HashMap::new();
        for code in ["binance", "bybit", "bitflyer"] {
            exchanges.insert(
                code.to_string(),
                Exchange {
                    code: code.to_string(),
                    name: code.to_string(),
                    maker_fee: dec!(0.001),
                    taker_fee: dec!(0.001),
                    withdrawal_fees: HashMap::new(),
                    active: true,
                },
            );
        }

        let binance = usdt_quote("binance", dec!(67_000), dec!(67_001), dec!(149));
        let bybit = usdt_quote("bybit", dec!(67_100), dec!(67_101), dec!(149));
        // bitflyer is native-JPY and carries no conversion metadata, so it
        // must be excluded even though it's present in the input slice.
        let bitflyer = Quote::new("bitflyer", "BTC/JPY", Utc::now(), dec!(10_200_000), dec!(10_201_000), dec!(1), dec!(1), None, None).unwrap();

        let opps = detect("BTC/JPY", &[binance, bybit, bitflyer], &exchanges, dec!(0.3), None);
        assert!(opps.iter().all(|o| o.kind == OpportunityKind::Usd));
        assert!(opps.iter().all(|o| o.pair_symbol == "BTC/USDT"));
        assert!(opps
            .iter()
            .all(|o| o.buy_exchange != "bitflyer" && o.sell_exchange != "bitflyer"));
    }

    #[test]
    fn prices_opportunities_in_usd_not_jpy() {
        let mut exchanges = HashMap::new();
        for code in ["binance", "bybit"] {
            exchanges.insert(
                code.to_string(),
                Exchange {
                    code: code.to_string(),
                    name: code.to_string(),
                    maker_fee: dec!(0),
                    taker_fee: dec!(0),
                    withdrawal_fees: HashMap::new(),
                    active: true,
                },
            );
        }

        // A 0.5% USD-denominated spread, converted through a large FX rate so
        // the JPY-valued bid/ask would dwarf the threshold if ever consulted
        // directly instead of the preserved USD figures.
        let binance = usdt_quote("binance", dec!(66_900), dec!(67_000), dec!(149));
        let bybit = usdt_quote("bybit", dec!(67_300), dec!(67_335), dec!(149));

        let opps = detect("BTC/JPY", &[binance, bybit], &exchanges, dec!(0.3), None);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].buy_price, dec!(67_000));
        assert_eq!(opps[0].sell_price, dec!(67_300));
    }

    #[test]
    fn position_cap_clamps_max_volume() {
        let mut exchanges = HashMap::new();
        for code in ["binance", "bybit"] {
            exchanges.insert(
                code.to_string(),
                Exchange {
                    code: code.to_string(),
                    name: code.to_string(),
                    maker_fee: dec!(0),
                    taker_fee: dec!(0),
                    withdrawal_fees: HashMap::new(),
                    active: true,
                },
            );
        }

        let binance = usdt_quote("binance", dec!(66_900), dec!(67_000), dec!(149));
        let bybit = usdt_quote("bybit", dec!(67_300), dec!(67_335), dec!(149));

        let opps = detect("BTC/JPY", &[binance, bybit], &exchanges, dec!(0.3), Some(dec!(0.1)));
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].max_volume, dec!(0.1));
    }
}
