//! Canonical data model for the arbitrage monitor.
//!
//! These are value objects: produced once by an adapter or the detector,
//! moved into the Store, and read back as immutable snapshots. Nothing here
//! is shared-mutable.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// A trading venue. Seeded by the operator, rarely mutated, never deleted
/// (deactivated instead via `active = false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub code: String,
    pub name: String,
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub withdrawal_fees: HashMap<String, Decimal>,
    pub active: bool,
}

/// A canonical "BASE/QUOTE" trading pair, venue-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub lot_increment: Option<Decimal>,
    pub price_increment: Option<Decimal>,
    pub active: bool,
}

impl CurrencyPair {
    pub fn new(symbol: impl Into<String>) -> Option<Self> {
        let symbol = symbol.into();
        let (base, quote) = symbol.split_once('/')?;
        Some(Self {
            symbol: symbol.clone(),
            base: base.to_string(),
            quote: quote.to_string(),
            lot_increment: None,
            price_increment: None,
            active: true,
        })
    }
}

/// Metadata attached to a quote that was produced via FX conversion rather
/// than being native to the venue's quote currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionMeta {
    pub original_bid: Decimal,
    pub original_ask: Decimal,
    pub fx_rate: Decimal,
}

/// One (exchange, pair, timestamp) price snapshot. Append-only, never mutated.
///
/// Invariant enforced at construction: `ask >= bid > 0`. Callers that would
/// otherwise persist a tick violating this MUST go through `Quote::new` and
/// propagate its `Err` as `AdapterError::MalformedQuote` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub exchange_code: String,
    pub pair_symbol: String,
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_size: Decimal,
    pub ask_size: Decimal,
    pub last: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    /// True when this tick is native to the venue's JPY quote currency.
    pub is_native_jpy: bool,
    /// Present when this tick was produced by converting a USDT-quoted
    /// price into JPY via the FX rate service.
    pub conversion: Option<ConversionMeta>,
}

impl Quote {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange_code: impl Into<String>,
        pair_symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        bid: Decimal,
        ask: Decimal,
        bid_size: Decimal,
        ask_size: Decimal,
        last: Option<Decimal>,
        volume_24h: Option<Decimal>,
    ) -> Result<Self, AdapterError> {
        if bid <= Decimal::ZERO {
            return Err(AdapterError::MalformedQuote(format!(
                "bid must be positive, got {bid}"
            )));
        }
        if ask <= Decimal::ZERO {
            return Err(AdapterError::MalformedQuote(format!(
                "ask must be positive, got {ask}"
            )));
        }
        if ask < bid {
            return Err(AdapterError::MalformedQuote(format!(
                "ask ({ask}) must be >= bid ({bid})"
            )));
        }
        Ok(Self {
            exchange_code: exchange_code.into(),
            pair_symbol: pair_symbol.into(),
            timestamp,
            bid,
            ask,
            bid_size,
            ask_size,
            last,
            volume_24h,
            is_native_jpy: false,
            conversion: None,
        })
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Whether this tick is still within the freshness window `w` as of `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.signed_duration_since(self.timestamp) <= window
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// A depth snapshot, sampled less frequently than top-of-book quotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub id: Option<i64>,
    pub exchange_code: String,
    pub pair_symbol: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
    pub depth: i32,
}

/// An account balance snapshot. Optional — monitoring-mode may omit entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub exchange_code: String,
    pub asset: String,
    pub timestamp: DateTime<Utc>,
    pub available: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }
}

/// Which detection strategy produced an opportunity. A closed sum type per
/// the source's four-flavor taxonomy; all variants share the same payload
/// shape today (see `ArbitrageOpportunity`), so this is a plain tag rather
/// than per-variant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    Direct,
    CrossRate,
    Usd,
    Triangle,
    Latency,
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpportunityKind::Direct => "direct",
            OpportunityKind::CrossRate => "cross_rate",
            OpportunityKind::Usd => "usd",
            OpportunityKind::Triangle => "triangle",
            OpportunityKind::Latency => "latency",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    Detected,
    Skipped,
    Notified,
}

/// Fee breakdown attached to a detected opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub buy_fees: Decimal,
    pub sell_fees: Decimal,
    pub transfer_fee: Decimal,
    pub total_fees_pct: Decimal,
}

/// A detected arbitrage opportunity. Immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub kind: OpportunityKind,
    pub pair_symbol: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub price_diff_pct: Decimal,
    pub estimated_profit_pct: Decimal,
    pub max_volume: Decimal,
    pub fees: FeeBreakdown,
    pub status: OpportunityStatus,
    pub skip_reason: Option<String>,
}

impl ArbitrageOpportunity {
    /// Route key used by the notification gate's per-route cooldown:
    /// `"{pair}:{buy_venue}->{sell_venue}"`.
    pub fn route_key(&self) -> String {
        format!(
            "{}:{}->{}",
            self.pair_symbol, self.buy_exchange, self.sell_exchange
        )
    }
}
