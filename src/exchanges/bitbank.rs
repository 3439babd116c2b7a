//! bitbank adapter.
//!
//! Public ticker is unauthenticated. Private requests (unused here) sign
//! `nonce + path` (GET) or `nonce + body` (POST) with HMAC-SHA256, where
//! nonce is a millisecond epoch, sent as `ACCESS-NONCE` / `ACCESS-SIGNATURE`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{hmac_sha256_hex, now_millis, ExchangeAdapter};
use crate::error::AdapterError;
use crate::types::{OrderbookLevel, OrderbookSnapshot, Quote};

pub struct BitbankAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl BitbankAdapter {
    pub fn new(client: Client, base_url: String, api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
            api_secret,
        }
    }

    #[allow(dead_code)]
    fn sign_get(&self, path: &str) -> Option<(String, String, String)> {
        let secret = self.api_secret.as_ref()?;
        let nonce = now_millis().to_string();
        let message = format!("{nonce}{path}");
        let sign = hmac_sha256_hex(secret, &message);
        Some((self.api_key.clone()?, nonce, sign))
    }

    fn pair_path(pair_symbol: &str) -> String {
        pair_symbol.to_lowercase().replace('/', "_")
    }
}

#[derive(Deserialize)]
struct BitbankEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct BitbankTicker {
    sell: Decimal,
    buy: Decimal,
    last: Decimal,
    vol: Decimal,
}

#[derive(Deserialize)]
struct BitbankDepth {
    bids: Vec<[Decimal; 2]>,
    asks: Vec<[Decimal; 2]>,
}

#[async_trait]
impl ExchangeAdapter for BitbankAdapter {
    fn code(&self) -> &str {
        "bitbank"
    }

    async fn get_ticker(&self, pair_symbol: &str) -> Result<Quote, AdapterError> {
        let url = format!("{}/{}/ticker", self.base_url, Self::pair_path(pair_symbol));
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

        let envelope: BitbankEnvelope<BitbankTicker> = resp
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;
        let t = envelope.data;

        let mut quote = Quote::new(
            self.code(),
            pair_symbol,
            Utc::now(),
            t.buy,
            t.sell,
            Decimal::ZERO,
            Decimal::ZERO,
            Some(t.last),
            Some(t.vol),
        )?;
        quote.is_native_jpy = true;
        Ok(quote)
    }

    async fn get_orderbook(&self, pair_symbol: &str) -> Result<OrderbookSnapshot, AdapterError> {
        let url = format!("{}/{}/depth", self.base_url, Self::pair_path(pair_symbol));
        let envelope: BitbankEnvelope<BitbankDepth> = self
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
            .map(|[price, size]| OrderbookLevel { price, size })
            .collect();
        let asks: Vec<OrderbookLevel> = envelope
            .data
            .asks
            .into_iter()
            .map(|[price, size]| OrderbookLevel { price, size })
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
