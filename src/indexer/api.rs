use url::Url;

use crate::indexer::pagination::PageQuery;
use crate::models::errors::EngineError;

/// URL builders for the upstream ledger API.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    base: Url,
}

impl ApiEndpoints {
    pub fn new(base: Url) -> Result<Self, EngineError> {
        if base.cannot_be_a_base() {
            return Err(EngineError::InvalidConfig(format!(
                "api_url {base} cannot carry a path"
            )));
        }
        Ok(Self { base })
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Successful stake/unstake transfers of `asset_key` touching the staking contract.
    pub fn contract_transfers(&self, contract: &str, asset_key: &str, functions: &[&str]) -> PageQuery {
        let functions = functions.join(",");
        let query = [
            ("token", asset_key),
            ("status", "success"),
            ("function", functions.as_str()),
        ];
        PageQuery::new(self.url(&["accounts", contract, "transfers"], &query))
            .with_count(self.url(&["accounts", contract, "transfers", "count"], &query))
    }

    /// NFTs and SFTs of one collection currently custodied by `account`.
    pub fn account_nfts(&self, account: &str, collection: &str) -> PageQuery {
        let query = [("collections", collection)];
        PageQuery::new(self.url(&["accounts", account, "nfts"], &query))
            .with_count(self.url(&["accounts", account, "nfts", "count"], &query))
    }

    pub fn account_token(&self, account: &str, token: &str) -> Url {
        self.url(&["accounts", account, "tokens", token], &[])
    }

    pub fn token_metadata(&self, token: &str) -> Url {
        self.url(&["tokens", token], &[])
    }

    pub fn collection_nfts(&self, collection: &str) -> PageQuery {
        PageQuery::new(self.url(&["collections", collection, "nfts"], &[("withOwner", "true")]))
            .with_count(self.url(&["collections", collection, "nfts", "count"], &[]))
    }

    pub fn collection_accounts(&self, collection: &str) -> PageQuery {
        PageQuery::new(self.url(&["collections", collection, "accounts"], &[]))
    }

    pub fn token_accounts(&self, token: &str) -> PageQuery {
        PageQuery::new(self.url(&["tokens", token, "accounts"], &[]))
            .with_count(self.url(&["tokens", token, "accounts", "count"], &[]))
    }
}
