//! GMO Coin adapter.
//!
//! Public ticker unauthenticated (`GET /public/v1/ticker?symbol=...`).
//! Private requests (unused here) sign `timestamp + method + path + body`
//! with HMAC-SHA256, where timestamp is a millisecond epoch, sent as
//! `API-TIMESTAMP` / `API-SIGN`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{hmac_sha256_hex, now_millis, ExchangeAdapter};
use crate::error::AdapterError;
use crate::types::{OrderbookLevel, OrderbookSnapshot, Quote};

pub struct GmoAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl GmoAdapter {
    pub fn new(client: Client, base_url: String, api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
            api_secret,
        }
    }

    #[allow(dead_code)]
    fn sign(&self, method: &str, path: &str, body: &str) -> Option<(String, String, String)> {
        let secret = self.api_secret.as_ref()?;
        let timestamp = now_millis().to_string();
        let message = format!("{timestamp}{method}{path}{body}");
        let sign = hmac_sha256_hex(secret, &message);
        Some((self.api_key.clone()?, timestamp, sign))
    }

    fn symbol(pair_symbol: &str) -> String {
        pair_symbol.replace('/', "_")
    }
}

#[derive(Deserialize)]
struct GmoEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct GmoTickerEntry {
    bid: Decimal,
    ask: Decimal,
    last: Decimal,
    volume: Decimal,
}

#[derive(Deserialize)]
struct GmoOrderbook {
    bids: Vec<GmoLevel>,
    asks: Vec<GmoLevel>,
}

#[derive(Deserialize)]
struct GmoLevel {
    price: Decimal,
    size: Decimal,
}

#[async_trait]
impl ExchangeAdapter for GmoAdapter {
    fn code(&self) -> &str {
        "gmo"
    }

    async fn get_ticker(&self, pair_symbol: &str) -> Result<Quote, AdapterError> {
        let url = format!(
            "{}/public/v1/ticker?symbol={}",
            self.base_url,
            Self::symbol(pair_symbol)
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        if resp.status() == 429 {
            return Err(AdapterError::RateLimited {
                retry_after_secs: super::retry_after_secs(&resp),
            });
        }

        let envelope: GmoEnvelope<Vec<GmoTickerEntry>> = resp
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;
        let t = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::MalformedQuote("empty ticker response".into()))?;

        let mut quote = Quote::new(
            self.code(),
            pair_symbol,
            Utc::now(),
            t.bid,
            t.ask,
            Decimal::ZERO,
            Decimal::ZERO,
            Some(t.last),
            Some(t.volume),
        )?;
        quote.is_native_jpy = true;
        Ok(quote)
    }

    async fn get_orderbook(&self, pair_symbol: &str) -> Result<OrderbookSnapshot, AdapterError> {
        let url = format!(
            "{}/public/v1/orderbooks?symbol={}",
            self.base_url,
            Self::symbol(pair_symbol)
        );
        let envelope: GmoEnvelope<GmoOrderbook> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        let bids: Vec<OrderbookLevel> = envelope
            .data
            .bids
            .into_iter()
            .map(|l| OrderbookLevel {
                price: l.price,
                size: l.size,
            })
            .collect();
        let asks: Vec<OrderbookLevel> = envelope
            .data
            .asks
            .into_iter()
            .map(|l| OrderbookLevel {
                price: l.price,
                size: l.size,
            })
            .collect();
        let depth = bids.len().max(asks.len()) as i32;

        Ok(OrderbookSnapshot {
            id: None,
            exchange_code: self.code().to_string(),
            pair_symbol: pair_symbol.to_string(),
            timestamp: Utc::now(),
            bids,
            asks,
            depth,
        })
    }

    async fn get_balance(&self, _asset: &str) -> Result<crate::types::Balance, AdapterError> {
        super::require_credentials(&self.api_key, &self.api_secret)?;
        Err(AdapterError::UnsupportedOperation)
    }
}
