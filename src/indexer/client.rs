use reqwest::header::RETRY_AFTER;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Raw answer of one GET, before any status classification.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

/// Transport used by the fetcher. An `Err` is a network-level failure (no HTTP status).
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &Url) -> impl Future<Output = Result<HttpResponse, String>> + Send;
}

impl HttpClient for reqwest::Client {
    async fn get(&self, url: &Url) -> Result<HttpResponse, String> {
        let response = reqwest::Client::get(self, url.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        // Only the delay-seconds form is honored
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}
