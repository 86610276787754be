#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use url::Url;

use holder_indexer::indexer::client::{HttpClient, HttpResponse};
use holder_indexer::models::common::StakingContractProfile;
use holder_indexer::utils::rate_limiter::RateLimitConfig;
use holder_indexer::utils::retry::RetryConfig;

pub const API_URL: &str = "https://api.ledger.test";
pub const CONTRACT: &str = "erd1qqqqqqqqqqqqqpgqstakingcontract";
pub const COLLECTION: &str = "COLL-a1b2c3";
pub const TOKEN: &str = "RIDE-7d18e9";

type Handler = dyn Fn(&Url) -> Result<HttpResponse, String> + Send + Sync;

/// In-memory ledger API answering through a handler and logging every request.
#[derive(Clone)]
pub struct MockApi {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<Url>>>,
}

impl MockApi {
    pub fn new(handler: impl Fn(&Url) -> Result<HttpResponse, String> + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpClient for MockApi {
    async fn get(&self, url: &Url) -> Result<HttpResponse, String> {
        self.requests.lock().unwrap().push(url.clone());
        (self.handler)(url)
    }
}

pub fn reply(status: u16, body: Value) -> Result<HttpResponse, String> {
    Ok(HttpResponse {
        status,
        retry_after: None,
        body: body.to_string().into_bytes(),
    })
}

pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Serve the `from`/`size` window of `records`.
pub fn page_of(records: &[Value], url: &Url) -> Result<HttpResponse, String> {
    let from = query_param(url, "from").and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
    let size = query_param(url, "size").and_then(|v| v.parse::<usize>().ok()).unwrap_or(25);
    let page = records.iter().skip(from).take(size).cloned().collect::<Vec<_>>();
    reply(200, Value::Array(page))
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        base_delay_ms: 20,
        max_delay_ms: 200,
        exponential: 2.0,
    }
}

pub fn unthrottled(max_concurrency: usize) -> RateLimitConfig {
    RateLimitConfig {
        requests_per_interval: 1_000,
        interval_ms: 1_000,
        max_concurrency,
    }
}

pub fn nft_profile() -> StakingContractProfile {
    StakingContractProfile::new(CONTRACT, "stake")
}

pub fn nft_stake(hash: &str, timestamp: u64, owner: &str, identifier: &str) -> Value {
    json!({
        "txHash": hash,
        "timestamp": timestamp,
        "nonce": timestamp,
        "sender": owner,
        "receiver": owner,
        "function": "stake",
        "status": "success",
        "action": {
            "category": "esdtNft",
            "name": "transfer",
            "arguments": {
                "transfers": [{ "type": "NonFungibleESDT", "collection": COLLECTION, "identifier": identifier }],
                "receiver": CONTRACT
            }
        }
    })
}

pub fn nft_unstake(hash: &str, timestamp: u64, owner: &str, identifier: &str) -> Value {
    json!({
        "txHash": hash,
        "timestamp": timestamp,
        "nonce": timestamp,
        "sender": CONTRACT,
        "receiver": CONTRACT,
        "function": "ESDTNFTTransfer",
        "status": "success",
        "action": {
            "category": "esdtNft",
            "name": "transfer",
            "arguments": {
                "transfers": [{ "type": "NonFungibleESDT", "collection": COLLECTION, "identifier": identifier }],
                "receiver": owner
            }
        }
    })
}

/// SFT stake: the owner self-transfers `value` units of `identifier` to the contract.
pub fn sft_stake(hash: &str, timestamp: u64, owner: &str, identifier: &str, value: &str) -> Value {
    sft_transfer(hash, timestamp, "stake", owner, CONTRACT, identifier, value)
}

pub fn sft_unstake(hash: &str, timestamp: u64, owner: &str, identifier: &str, value: &str) -> Value {
    sft_transfer(hash, timestamp, "ESDTNFTTransfer", CONTRACT, owner, identifier, value)
}

fn sft_transfer(
    hash: &str,
    timestamp: u64,
    function: &str,
    sender: &str,
    receiver: &str,
    identifier: &str,
    value: &str,
) -> Value {
    json!({
        "txHash": hash,
        "timestamp": timestamp,
        "nonce": timestamp,
        "sender": sender,
        "receiver": sender,
        "function": function,
        "status": "success",
        "action": {
            "category": "esdtNft",
            "name": "transfer",
            "arguments": {
                "transfers": [{
                    "type": "SemiFungibleESDT",
                    "collection": COLLECTION,
                    "identifier": identifier,
                    "value": value
                }],
                "receiver": receiver
            }
        }
    })
}

pub fn token_transfer(hash: &str, timestamp: u64, function: &str, sender: &str, receiver: &str, value: &str) -> Value {
    json!({
        "txHash": hash,
        "timestamp": timestamp,
        "nonce": timestamp,
        "sender": sender,
        "receiver": receiver,
        "function": function,
        "status": "success",
        "action": {
            "category": "esdtNft",
            "name": "transfer",
            "arguments": {
                "transfers": [{ "type": "FungibleESDT", "token": TOKEN, "ticker": "RIDE", "value": value }]
            }
        }
    })
}
