use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::models::errors::FetchError;
use crate::utils::strip_html;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential: 2.0,
        }
    }
}

/// Retries performed for one successful operation and the sleeps between them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub retries: u32,
    pub backoff: Vec<Duration>,
}

impl RetryStats {
    pub fn total_backoff(&self) -> Duration {
        self.backoff.iter().sum()
    }
}

/// Delay before the next attempt after `attempt` failures.
pub fn backoff_delay(config: &RetryConfig, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63) as i32;
    let max_delay = config.max_delay_ms as f64;
    let capped = (config.base_delay_ms as f64 * config.exponential.powi(exponent)).min(max_delay);

    // Equal jitter: half of the delay is fixed, the other half random
    // https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/
    let jittered = capped / 2.0 + fastrand::f64() * capped / 2.0;
    let delay = Duration::from_millis(jittered as u64);

    match retry_after {
        Some(server_delay) => delay
            .max(server_delay)
            .min(Duration::from_millis(config.max_delay_ms)),
        None => delay,
    }
}

pub async fn retry<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    context: &str,
) -> Result<(T, RetryStats), FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut stats = RetryStats::default();

    loop {
        match operation().await {
            Ok(result) => return Ok((result, stats)),
            Err(e) if !e.is_transient() => {
                error!("Operation '{}' failed with a non-retryable error: {}", context, e);
                return Err(e);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    error!(
                        "Operation '{}' failed after {} attempts. Final error: {}",
                        context, attempt, e
                    );
                    return Err(exhausted(e, attempt));
                }

                let delay = backoff_delay(config, attempt, e.retry_after());
                warn!(
                    "Attempt {}/{} for '{}' failed: {}. Retrying in {}ms...",
                    attempt,
                    max_attempts,
                    context,
                    strip_html(&e.to_string()),
                    delay.as_millis()
                );

                sleep(delay).await;
                stats.retries += 1;
                stats.backoff.push(delay);
                attempt += 1;
            }
        }
    }
}

fn exhausted(last: FetchError, attempts: u32) -> FetchError {
    match last {
        FetchError::Transient {
            url,
            status,
            message,
            ..
        } => FetchError::Exhausted {
            url,
            attempts,
            status,
            message: strip_html(&message),
        },
        other => other,
    }
}
