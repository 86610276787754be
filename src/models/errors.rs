use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Transient failure fetching {url} (status {status:?}): {message}")]
    Transient {
        url: String,
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Request to {url} rejected with HTTP {status}: {message}")]
    Rejected {
        url: String,
        status: u16,
        message: String,
    },
    #[error("Unexpected response body from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("Fetching {url} failed after {attempts} attempts (last status {status:?}): {message}")]
    Exhausted {
        url: String,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },
}

impl FetchError {
    /// Only transient failures are retried; everything else surfaces at once.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Unsupported staking profile: {label}")]
    UnsupportedProfile { label: String },
    #[error("No holders found for {asset_key}")]
    NoHolders { asset_key: String },
    #[error("Operation timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("Token {token} has no decimals in its metadata")]
    MissingDecimals { token: String },
    #[error("Token {token} declares {decimals} decimals, more than a 256-bit amount can scale")]
    UnsupportedDecimals { token: String, decimals: u8 },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// The caller-facing layer maps this to a "not found" answer instead of a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NoHolders { .. })
    }
}
