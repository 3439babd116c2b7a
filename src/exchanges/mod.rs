//! Exchange adapter abstraction and the six venue implementations.
//!
//! `ExchangeAdapter` is deliberately wider than the monitor needs: it still
//! carries the order-management methods a trading adapter would need, each
//! defaulted to `Err(AdapterError::UnsupportedOperation)`. The monitor never
//! calls them; they exist so the trait describes "an exchange", not "a
//! read-only exchange", matching how the teacher's own adapters are shaped.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

pub mod binance;
pub mod bitbank;
pub mod bitflyer;
pub mod bybit;
pub mod coincheck;
pub mod gmo;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::types::{Balance, OrderbookSnapshot, Quote};

/// A single order-management request, defaulted out for every adapter today.
/// Kept as a trait method rather than deleted so a future execution engine
/// has a seam to implement against without reshaping this trait.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Short venue code, e.g. `"bitflyer"`. Must match the key used in
    /// `exchanges.yaml` and every `Quote::exchange_code`.
    fn code(&self) -> &str;

    /// Fetch the current top-of-book quote for `pair_symbol`.
    async fn get_ticker(&self, pair_symbol: &str) -> Result<Quote, AdapterError>;

    /// Fetch an order book snapshot at the adapter's default depth.
    async fn get_orderbook(&self, pair_symbol: &str) -> Result<OrderbookSnapshot, AdapterError>;

    /// Fetch quotes for every pair this adapter is configured to track.
    /// The default fans out `get_ticker` sequentially; adapters with a
    /// cheaper bulk endpoint (e.g. binance's `/ticker/bookTicker`) override
    /// this.
    async fn collect_all(&self, pairs: &[String]) -> Vec<Result<Quote, AdapterError>> {
        let mut out = Vec::with_capacity(pairs.len());
        for pair in pairs {
            out.push(self.get_ticker(pair).await);
        }
        out
    }

    async fn get_balance(&self, _asset: &str) -> Result<Balance, AdapterError> {
        Err(AdapterError::UnsupportedOperation)
    }

    async fn place_order(
        &self,
        _pair_symbol: &str,
        _side: &str,
        _price: rust_decimal::Decimal,
        _size: rust_decimal::Decimal,
    ) -> Result<String, AdapterError> {
        Err(AdapterError::UnsupportedOperation)
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<(), AdapterError> {
        Err(AdapterError::UnsupportedOperation)
    }

    async fn list_orders(&self, _pair_symbol: &str) -> Result<Vec<String>, AdapterError> {
        Err(AdapterError::UnsupportedOperation)
    }
}

pub(crate) fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

pub(crate) fn now_micros() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros()
}

/// Shared credentials gate for private-endpoint stubs (§4.C.2): an adapter
/// with no key/secret configured must fail `CredentialsMissing` rather than
/// `UnsupportedOperation`, so operators can tell "not wired up" apart from
/// "genuinely not implemented".
pub(crate) fn require_credentials(
    api_key: &Option<String>,
    api_secret: &Option<String>,
) -> Result<(), AdapterError> {
    if api_key.is_none() || api_secret.is_none() {
        return Err(AdapterError::CredentialsMissing);
    }
    Ok(())
}

/// Extract a venue's advertised backoff period from a 429 response's
/// `Retry-After` header (seconds, per RFC 7231). Venues that omit the
/// header get a conservative 1s default rather than hammering them again
/// next tick (§4.C.2).
pub(crate) fn retry_after_secs(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1)
}

pub(crate) fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
