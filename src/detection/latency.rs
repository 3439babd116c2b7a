//! Latency arbitrage (exploiting propagation delay between venues for the
//! same quote).
//!
//! Same status as `triangle`: a documented no-op. The source system's
//! equivalent analyzer function returns an empty result unconditionally;
//! this port preserves that rather than guessing at a timing model.

use crate::types::ArbitrageOpportunity;

pub fn detect() -> Vec<ArbitrageOpportunity> {
    Vec::new()
}
