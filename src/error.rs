//! Error taxonomy for the collection pipeline, detection engine, and notification gate.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use thiserror::Error;

/// Errors an exchange adapter can raise for a single call.
///
/// All of these are contained within the collection cycle that produced them;
/// only `ConfigError::Invalid` (below) ever aborts the process.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("rate limited, back off for {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed quote: {0}")]
    MalformedQuote(String),

    #[error("operation not supported in monitoring mode")]
    UnsupportedOperation,

    #[error("credentials missing for private endpoint")]
    CredentialsMissing,
}

/// Errors the Store can raise. Both collection and detection cycles treat
/// any `Unavailable` as "skip this cycle", not a fatal condition.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Configuration errors. The only error kind that is fatal at boot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
