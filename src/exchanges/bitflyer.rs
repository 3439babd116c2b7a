//! bitFlyer adapter.
//!
//! Public ticker is unauthenticated (`GET /v1/ticker?product_code=...`);
//! private endpoints (unused here) sign `timestamp + method + path + body`
//! with HMAC-SHA256 over the API secret, sent as `ACCESS-KEY` /
//! `ACCESS-TIMESTAMP` / `ACCESS-SIGN`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{hmac_sha256_hex, now_millis, ExchangeAdapter};
use crate::error::AdapterError;
use crate::types::{OrderbookLevel, OrderbookSnapshot, Quote};

pub struct BitflyerAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl BitflyerAdapter {
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

    fn product_code(pair_symbol: &str) -> String {
        pair_symbol.replace('/', "_")
    }
}

#[derive(Deserialize)]
struct BitflyerTicker {
    best_bid: Decimal,
    best_ask: Decimal,
    best_bid_size: Decimal,
    best_ask_size: Decimal,
    ltp: Decimal,
    volume: Decimal,
}

#[derive(Deserialize)]
struct BitflyerBoard {
    bids: Vec<BitflyerLevel>,
    asks: Vec<BitflyerLevel>,
}

#[derive(Deserialize)]
struct BitflyerLevel {
    price: Decimal,
    size: Decimal,
}

#[async_trait]
impl ExchangeAdapter for BitflyerAdapter {
    fn code(&self) -> &str {
        "bitflyer"
    }

    async fn get_ticker(&self, pair_symbol: &str) -> Result<Quote, AdapterError> {
        let product_code = Self::product_code(pair_symbol);
        let url = format!("{}/v1/ticker?product_code={}", self.base_url, product_code);
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

        let ticker: BitflyerTicker = resp
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        let mut quote = Quote::new(
            self.code(),
            pair_symbol,
            Utc::now(),
            ticker.best_bid,
            ticker.best_ask,
            ticker.best_bid_size,
            ticker.best_ask_size,
            Some(ticker.ltp),
            Some(ticker.volume),
        )?;
        quote.is_native_jpy = true;
        Ok(quote)
    }

    async fn get_orderbook(&self, pair_symbol: &str) -> Result<OrderbookSnapshot, AdapterError> {
        let product_code = Self::product_code(pair_symbol);
        let url = format!("{}/v1/board?product_code={}", self.base_url, product_code);
        let board: BitflyerBoard = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        let bids: Vec<OrderbookLevel> = board
            .bids
            .into_iter()
            .map(|l| OrderbookLevel {
                price: l.price,
                size: l.size,
            })
            .collect();
        let asks: Vec<OrderbookLevel> = board
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
