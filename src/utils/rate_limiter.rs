use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_interval: usize,
    pub interval_ms: u64,
    pub max_concurrency: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_interval: 5,
            interval_ms: 1_000,
            max_concurrency: 5,
        }
    }
}

// Fixed window of the token bucket
struct Window {
    started: Instant,
    used: usize,
}

/// RateLimiter hands out at most `requests_per_interval` tokens per fixed interval
/// and bounds the number of requests in flight.
pub struct RateLimiter {
    // Budget of requests per window
    requests_per_interval: usize,

    // Length of one window
    interval: Duration,

    // Current window, shared by every caller of one operation
    window: Mutex<Window>,

    // Semaphore to control concurrent access
    semaphore: Semaphore,

    max_concurrency: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        RateLimiter {
            requests_per_interval: config.requests_per_interval.max(1),
            interval: Duration::from_millis(config.interval_ms),
            window: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
            semaphore: Semaphore::new(max_concurrency),
            max_concurrency,
        }
    }

    /// Acquire permission to make a request.
    /// Waits for a free concurrency slot, then for a token in the current window.
    pub async fn acquire(&self) -> Result<RateLimitPermit<'_>, tokio::sync::AcquireError> {
        let permit = self.semaphore.acquire().await?;
        self.take_token().await;

        Ok(RateLimitPermit {
            start_time: Instant::now(),
            _permit: permit,
        })
    }

    async fn take_token(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                if now.duration_since(window.started) >= self.interval {
                    window.started = now;
                    window.used = 0;
                }
                if window.used < self.requests_per_interval {
                    window.used += 1;
                    return;
                }
                self.interval
                    .saturating_sub(now.duration_since(window.started))
            };
            sleep(wait).await;
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

/// A permit that represents permission to make a request.
/// The concurrency slot is released when it is dropped.
pub struct RateLimitPermit<'a> {
    start_time: Instant,
    _permit: tokio::sync::SemaphorePermit<'a>,
}

impl RateLimitPermit<'_> {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_basic() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_interval: 100,
            interval_ms: 1_000,
            max_concurrency: 5,
        });

        // Acquire permits
        let mut permits = Vec::new();
        for _ in 0..5 {
            let permit = limiter.acquire().await.unwrap();
            permits.push(permit);
        }

        // Should be at the limit now
        assert_eq!(limiter.semaphore.available_permits(), 0);

        // Release one permit
        permits.pop();

        // Should be able to acquire one more
        let _permit = limiter.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_for_next_window() {
        let start = Instant::now();
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_interval: 2,
            interval_ms: 100,
            max_concurrency: 4,
        });

        for _ in 0..2 {
            drop(limiter.acquire().await.unwrap());
        }
        assert!(start.elapsed() < Duration::from_millis(100));

        // Third request of the window has to wait for the next one
        drop(limiter.acquire().await.unwrap());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_rate_limiter_is_shared_across_tasks() {
        let start = Instant::now();
        let limiter = std::sync::Arc::new(RateLimiter::new(&RateLimitConfig {
            requests_per_interval: 3,
            interval_ms: 100,
            max_concurrency: 3,
        }));

        let handles = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    drop(limiter.acquire().await.unwrap());
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap();
        }

        // Six tokens at three per window need a second window
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
