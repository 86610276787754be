use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::indexer::client::{HttpClient, HttpResponse};
use crate::metrics::Metrics;
use crate::models::errors::FetchError;
use crate::utils::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::utils::retry::{retry, RetryConfig, RetryStats};

const MAX_ERROR_BODY: usize = 200;

/// Issues GET requests through one shared token bucket, retrying transient failures.
pub struct RateLimitedFetcher<C> {
    client: C,
    limiter: RateLimiter,
    retry_config: RetryConfig,
    metrics: Option<Arc<Metrics>>,
}

impl<C: HttpClient> RateLimitedFetcher<C> {
    pub fn new(
        client: C,
        rate_limit: &RateLimitConfig,
        retry_config: RetryConfig,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            client,
            limiter: RateLimiter::new(rate_limit),
            retry_config,
            metrics,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.limiter.max_concurrency()
    }

    pub async fn fetch(&self, url: &Url) -> Result<Value, FetchError> {
        self.fetch_with_stats(url).await.map(|(value, _)| value)
    }

    /// Like `fetch`, but also reports how many retries the success took.
    pub async fn fetch_with_stats(&self, url: &Url) -> Result<(Value, RetryStats), FetchError> {
        let endpoint = endpoint_label(url);
        let result = retry(
            || self.attempt(url, &endpoint),
            &self.retry_config,
            url.as_str(),
        )
        .await;

        if let (Some(metrics), Ok((_, stats))) = (&self.metrics, &result) {
            if stats.retries > 0 {
                metrics
                    .api_retries
                    .add(stats.retries as u64, &metrics.labels(&endpoint));
            }
        }

        result
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        let value = self.fetch(url).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn attempt(&self, url: &Url, endpoint: &str) -> Result<Value, FetchError> {
        let permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                status: None,
                message: format!("rate limiter unavailable: {e}"),
                retry_after: None,
            })?;

        // Record metrics if enabled
        if let Some(metrics) = &self.metrics {
            metrics.api_requests.add(1, &metrics.labels(endpoint));
        }

        let result = self.client.get(url).await;

        if let Some(metrics) = &self.metrics {
            metrics
                .api_latency
                .record(permit.elapsed().as_secs_f64(), &metrics.labels(endpoint));
        }
        drop(permit);

        let classified = match result {
            Ok(response) => classify(url, response),
            Err(message) => Err(FetchError::Transient {
                url: url.to_string(),
                status: None,
                message,
                retry_after: None,
            }),
        };

        if classified.is_err() {
            if let Some(metrics) = &self.metrics {
                metrics.api_errors.add(1, &metrics.labels(endpoint));
            }
        }

        classified
    }
}

fn classify(url: &Url, response: HttpResponse) -> Result<Value, FetchError> {
    match response.status {
        200..=299 => {
            debug!("GET {} -> {} ({} bytes)", url, response.status, response.body.len());
            serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        }
        429 | 500..=599 => Err(FetchError::Transient {
            url: url.to_string(),
            status: Some(response.status),
            message: error_body(&response.body),
            retry_after: response.retry_after,
        }),
        status => Err(FetchError::Rejected {
            url: url.to_string(),
            status,
            message: error_body(&response.body),
        }),
    }
}

fn error_body(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(MAX_ERROR_BODY).collect()
}

// "accounts/transfers" for /accounts/erd1.../transfers, keeps label cardinality low
fn endpoint_label(url: &Url) -> String {
    let segments = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default();
    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) if segments.len() > 1 => format!("{first}/{last}"),
        (Some(first), _) => first.to_string(),
        _ => "root".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            retry_after: None,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_classify_statuses() {
        let url = Url::parse("https://api.test/accounts/erd1x/transfers").unwrap();

        assert_eq!(classify(&url, response(200, "[1,2]")).unwrap(), serde_json::json!([1, 2]));
        assert!(classify(&url, response(429, "slow down")).unwrap_err().is_transient());
        assert!(classify(&url, response(502, "bad gateway")).unwrap_err().is_transient());
        assert!(matches!(
            classify(&url, response(404, "missing")),
            Err(FetchError::Rejected { status: 404, .. })
        ));
        assert!(matches!(
            classify(&url, response(200, "<html>")),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn test_endpoint_label() {
        let url = Url::parse("https://api.test/accounts/erd1x/transfers?from=0").unwrap();
        assert_eq!(endpoint_label(&url), "accounts/transfers");
        let url = Url::parse("https://api.test/tokens").unwrap();
        assert_eq!(endpoint_label(&url), "tokens");
    }
}
