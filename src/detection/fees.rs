//! Shared fee-model math used by every detection strategy.
//!
//! Mirrors §4.E.1's formula verbatim:
//!
//! ```text
//! total_fees_pct = (fee_buy*buy*max_vol + fee_sell*sell*max_vol + transfer_fee)
//!                  / (buy*max_vol) * 100
//! ```
//!
//! `fee_buy`/`fee_sell` are the venues' taker-fee fractions (e.g. `0.001` for
//! 0.10%); `transfer_fee` is the buy-side withdrawal fee, an absolute amount
//! in quote currency rather than a fraction, which is why it has to be
//! divided through by the trade notional to land in the same percent units
//! as everything else this gets subtracted from.

use rust_decimal::Decimal;

use crate::types::{Exchange, FeeBreakdown};

/// Round-trip fee breakdown for buying `max_volume` of `base_asset` at
/// `buy_price` on `buy_exchange` and selling at `sell_price` on
/// `sell_exchange`. Withdrawal/transfer fee is looked up by `base_asset` on
/// the buy side, since that's the asset that would need to move between
/// venues to realize the round trip; it's zero when the asset isn't listed
/// in the venue's fee table (native JPY legs, mainly).
///
/// Returns `None` when `buy_price` or `max_volume` is non-positive — the
/// zero-guard callers must honor before trusting `total_fees_pct`.
pub fn compute(
    buy_exchange: &Exchange,
    sell_exchange: &Exchange,
    base_asset: &str,
    buy_price: Decimal,
    sell_price: Decimal,
    max_volume: Decimal,
) -> Option<FeeBreakdown> {
    if buy_price <= Decimal::ZERO || max_volume <= Decimal::ZERO {
        return None;
    }

    let buy_fees = buy_exchange.taker_fee;
    let sell_fees = sell_exchange.taker_fee;
    let transfer_fee = buy_exchange
        .withdrawal_fees
        .get(base_asset)
        .copied()
        .unwrap_or(Decimal::ZERO);

    let notional = buy_price * max_volume;
    let fee_cost = buy_fees * buy_price * max_volume + sell_fees * sell_price * max_volume + transfer_fee;
    let total_fees_pct = fee_cost / notional * Decimal::ONE_HUNDRED;

    Some(FeeBreakdown {
        buy_fees,
        sell_fees,
        transfer_fee,
        total_fees_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn exchange(taker_fee: Decimal, withdrawal_fees: HashMap<String, Decimal>) -> Exchange {
        Exchange {
            code: "x".to_string(),
            name: "x".to_string(),
            maker_fee: taker_fee,
            taker_fee,
            withdrawal_fees,
            active: true,
        }
    }

    #[test]
    fn matches_the_worked_example_from_the_spec() {
        // Venue A ask 10,000,000 / Venue B bid 10,050,000, both fees 0.10%,
        // no transfer fee: price_diff_pct ~0.50%, total_fees_pct ~0.20%.
        let a = exchange(dec!(0.001), HashMap::new());
        let b = exchange(dec!(0.001), HashMap::new());

        let breakdown = compute(&a, &b, "BTC", dec!(10_000_000), dec!(10_050_000), dec!(1)).unwrap();
        assert_eq!(breakdown.total_fees_pct.round_dp(2), dec!(0.20));
    }

    #[test]
    fn transfer_fee_contributes_as_a_percentage_of_notional() {
        let mut withdrawal_fees = HashMap::new();
        withdrawal_fees.insert("BTC".to_string(), dec!(1_000));
        let a = exchange(dec!(0), withdrawal_fees);
        let b = exchange(dec!(0), HashMap::new());

        let breakdown = compute(&a, &b, "BTC", dec!(10_000_000), dec!(10_000_000), dec!(1)).unwrap();
        assert_eq!(breakdown.total_fees_pct.round_dp(4), dec!(0.0100));
    }

    #[test]
    fn zero_volume_is_rejected() {
        let a = exchange(dec!(0.001), HashMap::new());
        let b = exchange(dec!(0.001), HashMap::new());
        assert!(compute(&a, &b, "BTC", dec!(100), dec!(110), dec!(0)).is_none());
    }
}
