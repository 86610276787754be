use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::indexer::client::HttpClient;
use crate::indexer::fetcher::RateLimitedFetcher;
use crate::models::errors::FetchError;

/// A paginated collection: the listing URL and, when the API offers one, its count endpoint.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub url: Url,
    pub count_url: Option<Url>,
}

impl PageQuery {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            count_url: None,
        }
    }

    pub fn with_count(mut self, count_url: Url) -> Self {
        self.count_url = Some(count_url);
        self
    }
}

pub struct PaginatedCollector<'a, C> {
    fetcher: &'a RateLimitedFetcher<C>,
    page_size: usize,
}

impl<'a, C: HttpClient> PaginatedCollector<'a, C> {
    pub fn new(fetcher: &'a RateLimitedFetcher<C>, page_size: usize) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
        }
    }

    /// Fetch every page of `query` and return the records in page order.
    /// Any page that cannot be fetched aborts the whole collection.
    pub async fn collect_all(&self, query: &PageQuery) -> Result<Vec<Value>, FetchError> {
        let records = match &query.count_url {
            Some(count_url) => self.collect_counted(&query.url, count_url).await?,
            None => self.collect_until_short(&query.url).await?,
        };
        info!("Collected {} records from {}", records.len(), query.url.path());
        Ok(records)
    }

    async fn collect_counted(&self, url: &Url, count_url: &Url) -> Result<Vec<Value>, FetchError> {
        let count = self.fetcher.fetch(count_url).await?;
        let total = count.as_u64().ok_or_else(|| FetchError::Decode {
            url: count_url.to_string(),
            message: format!("expected a record count, got {count}"),
        })? as usize;
        debug!("{} reports {} records", count_url.path(), total);

        let offsets = (0..total).step_by(self.page_size);
        let pages = self.fetch_pages(url, offsets).await?;
        Ok(pages.into_iter().flat_map(|(_, page)| page).collect())
    }

    // Waves of consecutive pages; the first short page marks the end
    async fn collect_until_short(&self, url: &Url) -> Result<Vec<Value>, FetchError> {
        let width = self.fetcher.max_concurrency();
        let mut records = Vec::new();
        let mut next_offset = 0;

        loop {
            let offsets = (0..width).map(|i| next_offset + i * self.page_size);
            for (offset, page) in self.fetch_pages(url, offsets).await? {
                let short = page.len() < self.page_size;
                records.extend(page);
                if short {
                    debug!("Short page at offset {} ends {}", offset, url.path());
                    return Ok(records);
                }
            }
            next_offset += width * self.page_size;
        }
    }

    async fn fetch_pages(
        &self,
        url: &Url,
        offsets: impl Iterator<Item = usize>,
    ) -> Result<Vec<(usize, Vec<Value>)>, FetchError> {
        let mut pages = stream::iter(offsets)
            .map(|offset| self.fetch_page(url, offset))
            .buffer_unordered(self.fetcher.max_concurrency())
            .try_collect::<Vec<_>>()
            .await?;
        pages.sort_by_key(|(offset, _)| *offset);
        Ok(pages)
    }

    async fn fetch_page(&self, url: &Url, offset: usize) -> Result<(usize, Vec<Value>), FetchError> {
        let page_url = self.page_url(url, offset);
        match self.fetcher.fetch(&page_url).await? {
            Value::Array(records) => {
                debug!("Page at offset {} returned {} records", offset, records.len());
                Ok((offset, records))
            }
            other => Err(FetchError::Decode {
                url: page_url.to_string(),
                message: format!("expected an array page, got {}", json_kind(&other)),
            }),
        }
    }

    fn page_url(&self, url: &Url, offset: usize) -> Url {
        let mut page_url = url.clone();
        page_url
            .query_pairs_mut()
            .append_pair("from", &offset.to_string())
            .append_pair("size", &self.page_size.to_string());
        page_url
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
