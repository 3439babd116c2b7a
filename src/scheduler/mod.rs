//! Collection scheduler: two independent polling loops (quotes, order
//! books), each guarded against overlapping runs the way the source
//! system's APScheduler jobs are (`max_instances=1`) — here expressed with
//! a `try_lock` on a per-job mutex rather than pulling in a scheduler
//! crate, since a fixed two-job interval loop doesn't need one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::exchanges::ExchangeAdapter;
use crate::store::Store;

pub struct Scheduler {
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    pairs_by_adapter: HashMap<String, Vec<String>>,
    major_pairs: Vec<String>,
    store: Arc<Store>,
    quote_interval: Duration,
    orderbook_interval: Duration,
    call_timeout: Duration,
    quote_guard: Arc<Mutex<()>>,
    orderbook_guard: Arc<Mutex<()>>,
    /// Venue-advertised backoff from the last 429, keyed by `(venue, pair)`.
    /// Consulted before every call so a rate-limited venue sits out calls
    /// until its advertised `retry_after` elapses, instead of being hit
    /// again next tick (§4.C.2). `DashMap` since both loops' concurrent
    /// per-call futures read/write it without a single shared lock.
    rate_limited_until: DashMap<(String, String), Instant>,
}

impl Scheduler {
    pub fn new(
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        pairs_by_adapter: HashMap<String, Vec<String>>,
        major_pairs: Vec<String>,
        store: Arc<Store>,
        quote_interval: Duration,
        orderbook_interval: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            pairs_by_adapter,
            major_pairs,
            store,
            quote_interval,
            orderbook_interval,
            call_timeout,
            quote_guard: Arc::new(Mutex::new(())),
            orderbook_guard: Arc::new(Mutex::new(())),
            rate_limited_until: DashMap::new(),
        }
    }

    /// `Some(remaining)` when `venue`/`pair` is still inside a backoff
    /// window from a previous 429; the stale entry is dropped once it has
    /// elapsed so the map doesn't grow unbounded.
    fn backoff_remaining(&self, venue: &str, pair: &str) -> Option<Duration> {
        let key = (venue.to_string(), pair.to_string());
        match self.rate_limited_until.get(&key) {
            Some(until) if *until > Instant::now() => Some(*until - Instant::now()),
            Some(_) => {
                self.rate_limited_until.remove(&key);
                None
            }
            None => None,
        }
    }

    fn record_rate_limit(&self, venue: &str, pair: &str, retry_after: Duration) {
        self.rate_limited_until
            .insert((venue.to_string(), pair.to_string()), Instant::now() + retry_after);
    }

    /// Run both polling loops until `shutdown_signal` resolves, then drain
    /// in-flight work for up to `grace`.
    pub async fn run(self: Arc<Self>, shutdown_signal: impl std::future::Future<Output = ()>, grace: Duration) {
        let quote_task = {
            let this = self.clone();
            tokio::spawn(async move { this.quote_loop().await })
        };
        let orderbook_task = {
            let this = self.clone();
            tokio::spawn(async move { this.orderbook_loop().await })
        };

        shutdown_signal.await;
        info!("scheduler received shutdown signal, draining in-flight cycles");

        let drain = async {
            let _ = tokio::join!(quote_task, orderbook_task);
        };
        if timeout(grace, drain).await.is_err() {
            warn!(grace_secs = grace.as_secs(), "scheduler shutdown grace period elapsed before drain completed");
        }
    }

    async fn quote_loop(&self) {
        let mut tick = interval(self.quote_interval);
        loop {
            tick.tick().await;
            let Ok(_guard) = self.quote_guard.try_lock() else {
                debug!("quote cycle still running, skipping this tick");
                continue;
            };
            self.run_quote_cycle().await;
        }
    }

    async fn orderbook_loop(&self) {
        let mut tick = interval(self.orderbook_interval);
        loop {
            tick.tick().await;
            let Ok(_guard) = self.orderbook_guard.try_lock() else {
                debug!("orderbook cycle still running, skipping this tick");
                continue;
            };
            self.run_orderbook_cycle().await;
        }
    }

    async fn run_quote_cycle(&self) {
        let mut calls = Vec::new();
        for adapter in &self.adapters {
            let Some(pairs) = self.pairs_by_adapter.get(adapter.code()) else {
                continue;
            };
            for pair in pairs {
                if let Some(remaining) = self.backoff_remaining(adapter.code(), pair) {
                    debug!(venue = adapter.code(), pair = %pair, remaining_secs = remaining.as_secs(), "venue still backing off, skipping this tick");
                    continue;
                }
                let adapter = adapter.clone();
                let pair = pair.clone();
                let store = self.store.clone();
                let call_timeout = self.call_timeout;
                calls.push(async move {
                    match timeout(call_timeout, adapter.get_ticker(&pair)).await {
                        Ok(Ok(quote)) => {
                            if let Err(e) = store.insert_quote(&quote).await {
                                warn!(venue = adapter.code(), pair = %pair, error = %e, "failed to persist quote");
                            }
                            None
                        }
                        Ok(Err(crate::error::AdapterError::RateLimited { retry_after_secs })) => {
                            warn!(venue = adapter.code(), pair = %pair, retry_after_secs, "quote fetch rate limited, backing off");
                            Some((adapter.code().to_string(), pair, Duration::from_secs(retry_after_secs)))
                        }
                        Ok(Err(e)) => {
                            warn!(venue = adapter.code(), pair = %pair, error = %e, "quote fetch failed");
                            None
                        }
                        Err(_) => {
                            warn!(venue = adapter.code(), pair = %pair, "quote fetch timed out");
                            None
                        }
                    }
                });
            }
        }
        for outcome in join_all(calls).await.into_iter().flatten() {
            let (venue, pair, retry_after) = outcome;
            self.record_rate_limit(&venue, &pair, retry_after);
        }
    }

    async fn run_orderbook_cycle(&self) {
        let mut calls = Vec::new();
        for adapter in &self.adapters {
            for pair in &self.major_pairs {
                if let Some(remaining) = self.backoff_remaining(adapter.code(), pair) {
                    debug!(venue = adapter.code(), pair = %pair, remaining_secs = remaining.as_secs(), "venue still backing off, skipping this tick");
                    continue;
                }
                let adapter = adapter.clone();
                let pair = pair.clone();
                let store = self.store.clone();
                let call_timeout = self.call_timeout;
                calls.push(async move {
                    match timeout(call_timeout, adapter.get_orderbook(&pair)).await {
                        Ok(Ok(snapshot)) => {
                            if let Err(e) = store.insert_orderbook_snapshot(&snapshot).await {
                                warn!(venue = adapter.code(), pair = %pair, error = %e, "failed to persist orderbook snapshot");
                            }
                            None
                        }
                        Ok(Err(crate::error::AdapterError::RateLimited { retry_after_secs })) => {
                            warn!(venue = adapter.code(), pair = %pair, retry_after_secs, "orderbook fetch rate limited, backing off");
                            Some((adapter.code().to_string(), pair, Duration::from_secs(retry_after_secs)))
                        }
                        Ok(Err(e)) => {
                            warn!(venue = adapter.code(), pair = %pair, error = %e, "orderbook fetch failed");
                            None
                        }
                        Err(_) => {
                            warn!(venue = adapter.code(), pair = %pair, "orderbook fetch timed out");
                            None
                        }
                    }
                });
            }
        }
        for (venue, pair, retry_after) in join_all(calls).await.into_iter().flatten() {
            self.record_rate_limit(&venue, &pair, retry_after);
        }
    }
}
