//! Cross-exchange crypto spot arbitrage monitor.
//!
//! Observes public (and optionally private) market data across a handful of
//! Japanese and international exchanges, normalizes it into a common
//! currency view, detects price discrepancies large enough to be profitable
//! after fees, and dispatches rate-limited alerts to a chat webhook. This is
//! a monitoring engine, not an execution engine: nothing here places an
//! order.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

pub mod config;
pub mod detection;
pub mod error;
pub mod exchanges;
pub mod fx;
pub mod notifications;
pub mod scheduler;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use detection::{Detector, DetectionThresholds};
pub use error::{AdapterError, ConfigError, StoreError};
pub use fx::FxRateService;
pub use notifications::{GateDecision, NotificationGate, NotificationPolicyStore, WebhookClient};
pub use scheduler::Scheduler;
pub use store::Store;
pub use types::{ArbitrageOpportunity, CurrencyPair, Exchange, Quote};
