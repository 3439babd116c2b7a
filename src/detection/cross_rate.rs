//! Cross-rate arbitrage: compares a base asset's JPY-native mid price
//! against its USDT-quoted mid price, converted to JPY through the shared
//! FX rate.
//!
//! The source this was ported from treats this strategy's profitability
//! math as a stub (its price grid is built but never scored), so the
//! comparison formula below is this port's own call rather than a
//! transcription:
//!
//!   cross_diff_pct = (jpy_native_mid - usdt_via_fx_mid) / usdt_via_fx_mid * 100
//!
//! `usdt_via_fx_mid` is the `BASE/USDT` mid price already converted to JPY
//! by the adapter that produced the quote (see `Quote::conversion`), so no
//! FX lookup happens here — the detector only ever compares already-JPY
//! values.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::fees;
use crate::types::{ArbitrageOpportunity, Exchange, OpportunityKind, OpportunityStatus, Quote};

/// `jpy_quotes` are native-JPY ticks for `BASE/JPY`; `usdt_quotes` are
/// already-converted-to-JPY ticks for `BASE/USDT` (i.e. `quote.conversion`
/// is `Some`). Both must be for the same base asset.
pub fn detect(
    pair_symbol: &str,
    jpy_quotes: &[Quote],
    usdt_quotes: &[Quote],
    exchanges: &HashMap<String, Exchange>,
    min_profit_threshold_pct: Decimal,
    max_position_size: Option<Decimal>,
) -> Vec<ArbitrageOpportunity> {
    let mut out = Vec::new();
    let base_asset = pair_symbol.split('/').next().unwrap_or(pair_symbol);

    for native in jpy_quotes {
        for converted in usdt_quotes {
            let jpy_mid = native.mid();
            let usdt_via_fx_mid = converted.mid();
            if usdt_via_fx_mid <= Decimal::ZERO {
                continue;
            }

            let cross_diff_pct = (jpy_mid - usdt_via_fx_mid) / usdt_via_fx_mid * Decimal::ONE_HUNDRED;
            if cross_diff_pct < min_profit_threshold_pct {
                continue;
            }

            let (Some(buy_exchange), Some(sell_exchange)) = (
                exchanges.get(&converted.exchange_code),
                exchanges.get(&native.exchange_code),
            ) else {
                continue;
            };

            let mut max_volume = converted.ask_size.min(native.bid_size);
            if let Some(cap) = max_position_size {
                max_volume = max_volume.min(cap);
            }
            if max_volume <= Decimal::ZERO {
                continue;
            }

            let Some(fee_breakdown) = fees::compute(
                buy_exchange,
                sell_exchange,
                base_asset,
                converted.ask,
                native.bid,
                max_volume,
            ) else {
                continue;
            };
            let estimated_profit_pct = cross_diff_pct - fee_breakdown.total_fees_pct;
            if estimated_profit_pct <= Decimal::ZERO {
                continue;
            }

            out.push(ArbitrageOpportunity {
                id: None,
                timestamp: chrono::Utc::now(),
                kind: OpportunityKind::CrossRate,
                pair_symbol: pair_symbol.to_string(),
                buy_exchange: converted.exchange_code.clone(),
                sell_exchange: native.exchange_code.clone(),
                buy_price: converted.ask,
                sell_price: native.bid,
                price_diff_pct: cross_diff_pct,
                estimated_profit_pct,
                max_volume,
                fees: fee_breakdown,
                status: OpportunityStatus::Detected,
                skip_reason: None,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn exchange(code: &str) -> Exchange {
        Exchange {
            code: code.to_string(),
            name: code.to_string(),
            maker_fee: dec!(0.001),
            taker_fee: dec!(0.001),
            withdrawal_fees: HashMap::new(),
            active: true,
        }
    }

    #[test]
    fn domestic_premium_over_fx_implied_price_is_detected() {
        let mut exchanges = HashMap::new();
        exchanges.insert("bitflyer".to_string(), exchange("bitflyer"));
        exchanges.insert("binance".to_string(), exchange("binance"));

        let native = Quote::new("bitflyer", "BTC/JPY", Utc::now(), dec!(10_100_000), dec!(10_101_000), dec!(1), dec!(1), None, None).unwrap();
        let mut converted = Quote::new("binance", "BTC/USDT", Utc::now(), dec!(9_999_000), dec!(10_000_000), dec!(1), dec!(1), None, None).unwrap();
        converted.conversion = Some(crate::types::ConversionMeta {
            original_bid: dec!(67.0),
            original_ask: dec!(67.01),
            fx_rate: dec!(149.0),
        });

        let opps = detect("BTC/JPY", &[native], &[converted], &exchanges, dec!(0.1), None);
        assert!(!opps.is_empty());
        assert_eq!(opps[0].kind, OpportunityKind::CrossRate);
    }

    #[test]
    fn position_cap_clamps_max_volume() {
        let mut exchanges = HashMap::new();
        exchanges.insert("bitflyer".to_string(), exchange("bitflyer"));
        exchanges.insert("binance".to_string(), exchange("binance"));

        let native = Quote::new("bitflyer", "BTC/JPY", Utc::now(), dec!(10_100_000), dec!(10_101_000), dec!(1), dec!(1), None, None).unwrap();
        let mut converted = Quote::new("binance", "BTC/USDT", Utc::now(), dec!(9_999_000), dec!(10_000_000), dec!(1), dec!(1), None, None).unwrap();
        converted.conversion = Some(crate::types::ConversionMeta {
            original_bid: dec!(67.0),
            original_ask: dec!(67.01),
            fx_rate: dec!(149.0),
        });

        let opps = detect("BTC/JPY", &[native], &[converted], &exchanges, dec!(0.1), Some(dec!(0.4)));
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].max_volume, dec!(0.4));
    }
}
