//! Triangular arbitrage (e.g. JPY -> BTC -> ETH -> JPY within one venue).
//!
//! The system this was ported from never implemented this strategy's
//! scoring — its analyzer returns an empty result with a "planned" marker.
//! The interface is kept here so the detection pipeline has a stable seat
//! for it, but no semantics are invented; it stays a documented no-op.

use crate::types::ArbitrageOpportunity;

pub fn detect() -> Vec<ArbitrageOpportunity> {
    Vec::new()
}
